//! Runtime integration for pendulum sweeps.
//!
//! This crate owns everything with side effects: the task queue and worker
//! pool, the durable lifecycle markers, broker introspection, the metric
//! socket, and the handlers that wire them into a seeded sweep. Deterministic
//! contracts and the parameter grid come from `pendulum_sweep_core`.

pub mod adapters;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod settings;

pub use error::SweepError;
