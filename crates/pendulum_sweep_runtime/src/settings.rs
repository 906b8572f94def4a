use std::path::PathBuf;
use std::time::Duration;

use pendulum_sweep_core::contract::SweepConfig;
use pendulum_sweep_core::storage_keys::{results_table_path, DEFAULT_RESULTS_FILE_NAME};

use crate::adapters::metric_socket::DEFAULT_CONNECT_TIMEOUT;
use crate::adapters::queue::RetryPolicy;

pub const DEFAULT_SWEEP_DEADLINE: Duration = Duration::from_secs(3600);
pub const DEFAULT_MONITORED_QUEUES: [&str; 2] = ["server", "worker"];

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringSettings {
    pub server_name: String,
    pub server_port: u16,
    pub metric_prefix: String,
    pub queues: Vec<String>,
    pub connect_timeout: Duration,
    pub rabbitmqctl: PathBuf,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            server_name: "localhost".to_string(),
            server_port: 2003,
            metric_prefix: "pendulum".to_string(),
            queues: DEFAULT_MONITORED_QUEUES
                .iter()
                .map(|queue| queue.to_string())
                .collect(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            rabbitmqctl: PathBuf::from("rabbitmqctl"),
        }
    }
}

/// Everything a sweep process needs, resolved once at startup and passed down.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub status_dir: PathBuf,
    pub results_dir: PathBuf,
    pub results_file_name: String,
    pub sweep: SweepConfig,
    /// `None` lets rayon size the pool.
    pub worker_threads: Option<usize>,
    pub retry: RetryPolicy,
    pub sweep_deadline: Duration,
    pub monitoring: MonitoringSettings,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            status_dir: PathBuf::from("status"),
            results_dir: PathBuf::from("results"),
            results_file_name: DEFAULT_RESULTS_FILE_NAME.to_string(),
            sweep: SweepConfig::default(),
            worker_threads: None,
            retry: RetryPolicy::default(),
            sweep_deadline: DEFAULT_SWEEP_DEADLINE,
            monitoring: MonitoringSettings::default(),
        }
    }
}

impl RuntimeSettings {
    pub fn results_path(&self) -> PathBuf {
        results_table_path(&self.results_dir, &self.results_file_name)
    }
}
