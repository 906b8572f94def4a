#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pendulum_sim::{PendulumWorker, SimulationWorker, WorkerError};
use pendulum_sweep_core::contract::{ParameterPoint, ResultSet, SimulationResult, SweepConfig};
use pendulum_sweep_runtime::adapters::queue::{
    InProcessQueue, JobHandle, RetryPolicy, SimulationJob, TaskQueue,
};
use pendulum_sweep_runtime::error::Result;
use pendulum_sweep_runtime::handlers::aggregate::{CsvResultWriter, ResultSink};

pub fn small_config(theta_resolution: usize) -> SweepConfig {
    SweepConfig {
        theta_resolution,
        tmax: 0.5,
        dt: 0.05,
        ..SweepConfig::default()
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    }
}

pub fn queue_with(worker: Arc<dyn SimulationWorker>, max_attempts: u32) -> InProcessQueue {
    InProcessQueue::new("worker", worker, Some(2), fast_retry(max_attempts)).expect("queue")
}

/// Records every submitted job before handing it to the wrapped queue.
pub struct CapturingQueue<Q> {
    inner: Q,
    submitted: Mutex<Vec<SimulationJob>>,
}

impl<Q: TaskQueue> CapturingQueue<Q> {
    pub fn new(inner: Q) -> Self {
        Self {
            inner,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<SimulationJob> {
        self.submitted.lock().expect("submitted lock").clone()
    }
}

impl<Q: TaskQueue> TaskQueue for CapturingQueue<Q> {
    fn submit(&self, job: SimulationJob) -> Result<JobHandle> {
        self.submitted.lock().expect("submitted lock").push(job);
        self.inner.submit(job)
    }

    fn await_all(&self, handles: &[JobHandle], timeout: Duration) -> Result<ResultSet> {
        self.inner.await_all(handles, timeout)
    }
}

/// CSV sink that counts how often it is invoked and with how many results.
pub struct CountingSink {
    inner: CsvResultWriter,
    calls: AtomicUsize,
    sizes: Mutex<Vec<usize>>,
}

impl CountingSink {
    pub fn new(path: &Path) -> Self {
        Self {
            inner: CsvResultWriter::new(path),
            calls: AtomicUsize::new(0),
            sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.sizes.lock().expect("sizes lock").clone()
    }
}

impl ResultSink for CountingSink {
    fn write_results(&self, results: &ResultSet) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().expect("sizes lock").push(results.len());
        self.inner.write_results(results)
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// Crashes the first `failures` attempts for every point, then integrates normally.
pub struct FlakyWorker {
    failures: usize,
    attempts: Mutex<HashMap<(u64, u64), usize>>,
}

impl FlakyWorker {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().expect("attempts lock").values().sum()
    }
}

impl SimulationWorker for FlakyWorker {
    fn simulate(&self, point: &ParameterPoint) -> std::result::Result<SimulationResult, WorkerError> {
        let key = (point.theta1_init.to_bits(), point.theta2_init.to_bits());
        let attempt = {
            let mut attempts = self.attempts.lock().expect("attempts lock");
            let count = attempts.entry(key).or_insert(0);
            *count += 1;
            *count
        };

        if attempt <= self.failures {
            return Err(WorkerError::Crashed(format!("transient fault #{attempt}")));
        }
        PendulumWorker.simulate(point)
    }
}

/// Diverges on the point whose `theta1_init` and `theta2_init` are both non-zero.
pub struct DivergingWorker;

impl SimulationWorker for DivergingWorker {
    fn simulate(&self, point: &ParameterPoint) -> std::result::Result<SimulationResult, WorkerError> {
        if point.theta1_init != 0.0 && point.theta2_init != 0.0 {
            return Err(WorkerError::NumericDivergence {
                theta1_init: point.theta1_init,
                theta2_init: point.theta2_init,
                time: point.tmax / 2.0,
            });
        }
        PendulumWorker.simulate(point)
    }
}

pub struct SlowWorker(pub Duration);

impl SimulationWorker for SlowWorker {
    fn simulate(&self, point: &ParameterPoint) -> std::result::Result<SimulationResult, WorkerError> {
        thread::sleep(self.0);
        PendulumWorker.simulate(point)
    }
}

pub fn sorted_angles(angles: impl IntoIterator<Item = (f64, f64)>) -> Vec<(f64, f64)> {
    let mut angles: Vec<(f64, f64)> = angles.into_iter().collect();
    angles.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    angles
}
