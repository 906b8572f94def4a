use std::path::PathBuf;
use std::process::Command;

use crate::error::{Result, SweepError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub name: String,
    pub messages: u64,
    pub consumers: u64,
}

pub trait BrokerIntrospection {
    fn list_queues(&self) -> Result<Vec<QueueStats>>;
}

/// Asks a local RabbitMQ node for queue depths through its admin tool.
#[derive(Debug, Clone)]
pub struct RabbitmqctlBroker {
    program: PathBuf,
}

impl RabbitmqctlBroker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for RabbitmqctlBroker {
    fn default() -> Self {
        Self::new("rabbitmqctl")
    }
}

impl BrokerIntrospection for RabbitmqctlBroker {
    fn list_queues(&self) -> Result<Vec<QueueStats>> {
        let output = Command::new(&self.program)
            .args(["-q", "list_queues", "name", "messages", "consumers"])
            .output()
            .map_err(|error| {
                SweepError::Transport(format!("failed to run {}: {error}", self.program.display()))
            })?;

        if !output.status.success() {
            return Err(SweepError::Transport(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_list_queues(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses `name messages consumers` rows. Rows that do not fit are skipped.
pub fn parse_list_queues(listing: &str) -> Vec<QueueStats> {
    listing
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_queue_line(line) {
            Some(stats) => Some(stats),
            None => {
                tracing::warn!(
                    component = "broker_metrics",
                    event = "broker_line_skipped",
                    line,
                );
                None
            }
        })
        .collect()
}

fn parse_queue_line(line: &str) -> Option<QueueStats> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    let messages = fields.next()?.parse().ok()?;
    let consumers = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some(QueueStats {
        name: name.to_string(),
        messages,
        consumers,
    })
}
