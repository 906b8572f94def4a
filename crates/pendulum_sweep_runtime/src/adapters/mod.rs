pub mod broker;
pub mod metric_socket;
pub mod queue;
pub mod status_store;
