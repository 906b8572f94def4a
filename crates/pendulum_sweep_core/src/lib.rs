//! Shared pendulum sweep domain primitives.
//!
//! This crate owns the deterministic parts of a sweep: the configuration and
//! result contracts, the parameter grid, and the keys under which lifecycle
//! markers and result tables are stored. It carries no I/O, queue, or runtime
//! concerns; those live in `pendulum_sweep_runtime`.

pub mod contract;
pub mod grid;
pub mod storage_keys;
