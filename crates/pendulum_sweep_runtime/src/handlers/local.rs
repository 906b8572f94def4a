use pendulum_sim::{run_local_sweep, LocalSweepError, SimulationWorker};
use pendulum_sweep_core::contract::{
    config_fingerprint, validate_config, ParameterPoint, ResultSet, SweepConfig,
    CONTRACT_SCHEMA_VERSION,
};
use pendulum_sweep_core::grid::theta_grid;

use crate::error::{Result, SweepError};
use crate::handlers::aggregate::ResultSink;
use crate::handlers::seed::SweepReport;

/// Runs the whole grid in this process and writes the table.
///
/// No lifecycle markers are read or written, so this can be repeated freely.
pub fn run_local(
    config: &SweepConfig,
    worker: &dyn SimulationWorker,
    sink: &dyn ResultSink,
    threads: Option<usize>,
    show_progress: bool,
) -> Result<SweepReport> {
    let config = validate_config(config.clone())?;
    let points: Vec<ParameterPoint> = theta_grid(&config).collect();
    let expected = points.len();

    let results = run_local_sweep(&points, worker, threads, show_progress).map_err(|error| {
        match error {
            LocalSweepError::Worker(worker_error) => {
                SweepError::from_worker(worker_error, expected, 0)
            }
            LocalSweepError::Pool(pool_error) => {
                SweepError::Transport(format!("local worker pool: {pool_error}"))
            }
        }
    })?;

    let rows_written = sink.write_results(&ResultSet::from_results(expected, results))?;

    Ok(SweepReport {
        schema_version: CONTRACT_SCHEMA_VERSION.to_string(),
        fingerprint: config_fingerprint(&config),
        total_points: expected,
        rows_written,
        output: sink.describe(),
        status: "completed".to_string(),
    })
}
