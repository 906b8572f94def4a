use pendulum_sweep_core::storage_keys::queue_metric_path;

use crate::adapters::broker::{BrokerIntrospection, QueueStats};
use crate::adapters::metric_socket::MetricSink;
use crate::error::Result;
use crate::settings::MonitoringSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMetric {
    /// Messages waiting in the queue.
    Tasks,
    Consumers,
}

impl QueueMetric {
    pub const ALL: [QueueMetric; 2] = [Self::Tasks, Self::Consumers];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Consumers => "consumers",
        }
    }

    fn value(self, stats: &QueueStats) -> u64 {
        match self {
            Self::Tasks => stats.messages,
            Self::Consumers => stats.consumers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    pub queue_name: String,
    pub metric: QueueMetric,
    pub value: u64,
    pub timestamp: i64,
}

/// Picks the monitored queues out of a broker listing.
///
/// Queues the broker does not report produce no samples.
pub fn sample_queues(stats: &[QueueStats], queues: &[String], timestamp: i64) -> Vec<MetricSample> {
    queues
        .iter()
        .filter_map(|queue| stats.iter().find(|entry| &entry.name == queue))
        .flat_map(|entry| {
            QueueMetric::ALL.into_iter().map(move |metric| MetricSample {
                queue_name: entry.name.clone(),
                metric,
                value: metric.value(entry),
                timestamp,
            })
        })
        .collect()
}

pub fn format_metric_line(prefix: &str, sample: &MetricSample) -> String {
    format!(
        "{} {} {}\n",
        queue_metric_path(prefix, &sample.queue_name, sample.metric.as_str()),
        sample.value,
        sample.timestamp
    )
}

/// One sampling pass: read queue stats, ship them, return the number of lines sent.
pub fn monitor_queues(
    settings: &MonitoringSettings,
    broker: &dyn BrokerIntrospection,
    sink: &dyn MetricSink,
    timestamp: i64,
) -> Result<usize> {
    let stats = broker.list_queues()?;
    let samples = sample_queues(&stats, &settings.queues, timestamp);
    if samples.is_empty() {
        tracing::warn!(
            component = "broker_metrics",
            event = "metrics_shipped",
            lines = 0,
            queues = ?settings.queues,
        );
        return Ok(0);
    }

    let payload: String = samples
        .iter()
        .map(|sample| format_metric_line(&settings.metric_prefix, sample))
        .collect();
    sink.send_lines(&payload)?;

    tracing::info!(
        component = "broker_metrics",
        event = "metrics_shipped",
        lines = samples.len(),
        server = %format!("{}:{}", settings.server_name, settings.server_port),
    );
    Ok(samples.len())
}
