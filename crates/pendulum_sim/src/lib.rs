//! Double-pendulum simulation worker for parameter sweeps.
//!
//! Each grid point is integrated independently from rest and reduced to its
//! final-timestep state, so a worker can run anywhere a [`ParameterPoint`]
//! can be shipped.
//!
//! # Quick Start
//!
//! ```no_run
//! use pendulum_sim::{run_local_sweep, PendulumWorker};
//! use pendulum_sweep_core::contract::SweepConfig;
//! use pendulum_sweep_core::grid::theta_grid;
//!
//! let config = SweepConfig::default();
//! let points: Vec<_> = theta_grid(&config).collect();
//! let results = run_local_sweep(&points, &PendulumWorker, None, false).unwrap();
//! assert_eq!(results.len(), config.total_points());
//! ```
//!
//! # Architecture
//!
//! - [`model`]: equations of motion and bob positions
//! - [`integrator`]: fixed-step RK4 over `[0, tmax]`
//! - [`worker`]: the per-point worker contract and its error taxonomy
//! - [`runner`]: in-process parallel execution using rayon
//!
//! [`ParameterPoint`]: pendulum_sweep_core::contract::ParameterPoint

pub mod integrator;
pub mod model;
pub mod runner;
pub mod worker;

pub use runner::{run_local_sweep, LocalSweepError};
pub use worker::{simulate_point, PendulumWorker, SimulationWorker, WorkerError};
