use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, SweepError};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub trait MetricSink {
    /// Ships a batch of newline-terminated metric lines.
    fn send_lines(&self, payload: &str) -> Result<()>;
}

/// Plaintext metrics receiver reached over one short-lived TCP connection per batch.
#[derive(Debug, Clone)]
pub struct TcpMetricSink {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpMetricSink {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl MetricSink for TcpMetricSink {
    fn send_lines(&self, payload: &str) -> Result<()> {
        let endpoint = self.endpoint();
        let transport = |message: String| SweepError::Transport(format!("{endpoint}: {message}"));

        let addrs: Vec<_> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|error| transport(format!("failed to resolve: {error}")))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(mut stream) => {
                    // No acknowledgement is read back.
                    stream
                        .write_all(payload.as_bytes())
                        .and_then(|()| stream.flush())
                        .map_err(|error| transport(format!("failed to send: {error}")))?;
                    return Ok(());
                }
                Err(error) => last_error = Some(error),
            }
        }

        Err(match last_error {
            Some(error) => transport(format!("failed to connect: {error}")),
            None => transport("no addresses resolved".to_string()),
        })
    }
}
