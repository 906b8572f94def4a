use std::time::Duration;

use pendulum_sweep_core::contract::{
    config_fingerprint, validate_config, SweepConfig, CONTRACT_SCHEMA_VERSION,
};
use pendulum_sweep_core::grid::theta_grid;
use pendulum_sweep_core::storage_keys::LifecycleStatus;
use serde::Serialize;

use crate::adapters::queue::{SimulationJob, TaskQueue};
use crate::adapters::status_store::{current_status_timestamp, StatusStore, StatusWrite};
use crate::error::{Result, SweepError};
use crate::handlers::aggregate::ResultSink;

/// Collaborators for one sweep. All of them outlive the call.
pub struct SweepDependencies<'a> {
    pub status_store: &'a dyn StatusStore,
    pub queue: &'a dyn TaskQueue,
    pub sink: &'a dyn ResultSink,
    pub deadline: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub schema_version: String,
    pub fingerprint: String,
    pub total_points: usize,
    pub rows_written: usize,
    pub output: String,
    pub status: String,
}

/// Seeds the experiment once: claims the `started` marker, fans the grid out
/// to the queue, waits for every result and hands the full set to the sink.
///
/// A second call against the same status store fails with
/// [`SweepError::AlreadySeeded`] and dispatches nothing.
pub fn seed_sweep(config: &SweepConfig, deps: &SweepDependencies<'_>) -> Result<SweepReport> {
    let config = validate_config(config.clone())?;
    let fingerprint = config_fingerprint(&config);
    let started = LifecycleStatus::Started.as_str();

    if deps
        .status_store
        .record_status(started, &current_status_timestamp())?
        == StatusWrite::AlreadyPresent
    {
        let recorded_at = deps
            .status_store
            .read_status(started)
            .unwrap_or_else(|error| {
                tracing::warn!(
                    component = "orchestrator",
                    event = "status_read_failed",
                    status = started,
                    error = %error,
                );
                None
            });
        tracing::warn!(
            component = "orchestrator",
            event = "sweep_seed_rejected",
            fingerprint = %fingerprint,
            recorded_at = recorded_at.as_deref().unwrap_or("unknown"),
        );
        return Err(SweepError::AlreadySeeded { recorded_at });
    }

    tracing::info!(
        component = "orchestrator",
        event = "sweep_started",
        fingerprint = %fingerprint,
        theta_resolution = config.theta_resolution,
        tmax = config.tmax,
        dt = config.dt,
    );

    match dispatch_and_collect(&config, deps) {
        Ok(rows_written) => {
            record_best_effort(deps.status_store, LifecycleStatus::Completed);
            tracing::info!(
                component = "orchestrator",
                event = "sweep_completed",
                fingerprint = %fingerprint,
                rows_written,
                output = %deps.sink.describe(),
            );
            Ok(SweepReport {
                schema_version: CONTRACT_SCHEMA_VERSION.to_string(),
                fingerprint,
                total_points: config.total_points(),
                rows_written,
                output: deps.sink.describe(),
                status: LifecycleStatus::Completed.to_string(),
            })
        }
        Err(error) => {
            record_best_effort(deps.status_store, LifecycleStatus::Aborted);
            tracing::error!(
                component = "orchestrator",
                event = "sweep_aborted",
                fingerprint = %fingerprint,
                error_code = error.code(),
                error = %error,
            );
            Err(error)
        }
    }
}

fn dispatch_and_collect(config: &SweepConfig, deps: &SweepDependencies<'_>) -> Result<usize> {
    let grid = theta_grid(config);
    let expected = grid.total_points();

    let mut handles = Vec::with_capacity(expected);
    for (index, point) in grid.enumerate() {
        let handle = deps
            .queue
            .submit(SimulationJob { index, point })
            .map_err(|error| {
                SweepError::incomplete(expected, 0, format!("failed to submit job {index}: {error}"))
            })?;
        handles.push(handle);
    }

    tracing::info!(
        component = "orchestrator",
        event = "jobs_dispatched",
        jobs = handles.len(),
    );

    let results = deps.queue.await_all(&handles, deps.deadline)?;
    if results.len() != expected {
        return Err(SweepError::incomplete(
            expected,
            results.len(),
            "result set size does not match the request",
        ));
    }

    deps.sink.write_results(&results)
}

fn record_best_effort(store: &dyn StatusStore, status: LifecycleStatus) {
    if let Err(error) = store.record_status(status.as_str(), &current_status_timestamp()) {
        tracing::warn!(
            component = "orchestrator",
            event = "status_record_failed",
            status = status.as_str(),
            error = %error,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pendulum_sim::PendulumWorker;
    use pendulum_sweep_core::contract::ResultSet;

    use super::*;
    use crate::adapters::queue::{InProcessQueue, RetryPolicy};
    use crate::adapters::status_store::FsStatusStore;

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
    }

    impl ResultSink for CountingSink {
        fn write_results(&self, results: &ResultSet) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(results.len())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn small_config() -> SweepConfig {
        SweepConfig {
            theta_resolution: 2,
            tmax: 0.5,
            dt: 0.05,
            ..SweepConfig::default()
        }
    }

    #[test]
    fn completed_sweep_reports_rows_and_records_markers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStatusStore::new(dir.path());
        let queue = InProcessQueue::new(
            "worker",
            Arc::new(PendulumWorker),
            Some(2),
            RetryPolicy::no_retry(),
        )
        .expect("queue");
        let sink = CountingSink::default();
        let deps = SweepDependencies {
            status_store: &store,
            queue: &queue,
            sink: &sink,
            deadline: Duration::from_secs(30),
        };

        let report = seed_sweep(&small_config(), &deps).expect("sweep completes");

        assert_eq!(report.total_points, 4);
        assert_eq!(report.rows_written, 4);
        assert_eq!(report.output, "memory");
        assert_eq!(report.fingerprint, config_fingerprint(&small_config()));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert!(store.has_status("started").expect("lookup"));
        assert!(store.has_status("completed").expect("lookup"));
        assert!(!store.has_status("aborted").expect("lookup"));
    }

    #[test]
    fn invalid_config_claims_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStatusStore::new(dir.path());
        let queue = InProcessQueue::new(
            "worker",
            Arc::new(PendulumWorker),
            Some(1),
            RetryPolicy::no_retry(),
        )
        .expect("queue");
        let sink = CountingSink::default();
        let deps = SweepDependencies {
            status_store: &store,
            queue: &queue,
            sink: &sink,
            deadline: Duration::from_secs(5),
        };
        let config = SweepConfig {
            theta_resolution: 0,
            ..small_config()
        };

        let error = seed_sweep(&config, &deps).expect_err("config should be rejected");

        assert_eq!(error.code(), "validation_error");
        assert!(!store.has_status("started").expect("lookup"));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }
}
