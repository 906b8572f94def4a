//! In-process parallel sweep execution using rayon.
//!
//! This is the local counterpart of the queue-backed sweep: no lifecycle
//! guard, no barrier, just every point integrated on a thread pool.

use indicatif::{ProgressBar, ProgressStyle};
use pendulum_sweep_core::contract::{ParameterPoint, SimulationResult};
use rayon::prelude::*;

use crate::worker::{SimulationWorker, WorkerError};

#[derive(Debug, thiserror::Error)]
pub enum LocalSweepError {
    #[error("failed to build worker thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Run every point in parallel and return results in input order.
///
/// # Arguments
///
/// * `points` - Grid points to integrate
/// * `worker` - Worker used for each point
/// * `num_threads` - Optional number of threads to use. If None, uses rayon's default.
/// * `show_progress` - Whether to display a progress bar
///
/// # Errors
///
/// Fails on the first worker error; results of other points are discarded.
pub fn run_local_sweep(
    points: &[ParameterPoint],
    worker: &dyn SimulationWorker,
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<SimulationResult>, LocalSweepError> {
    let total = points.len();
    let progress = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Some(bar)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let results: Result<Vec<SimulationResult>, WorkerError> = pool.install(|| {
        points
            .par_iter()
            .map(|point| {
                let result = worker.simulate(point);
                if let Some(ref bar) = progress {
                    bar.inc(1);
                }
                result
            })
            .collect()
    });

    if let Some(ref bar) = progress {
        bar.finish_with_message("Completed");
    }

    let results = results?;
    tracing::info!(
        component = "local_runner",
        event = "local_sweep_completed",
        points = results.len(),
    );
    Ok(results)
}
