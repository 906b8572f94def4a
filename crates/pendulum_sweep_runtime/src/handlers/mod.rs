pub mod aggregate;
pub mod local;
pub mod monitor;
pub mod seed;
