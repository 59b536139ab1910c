//! Pure connection state for the device stream
//!
//! This module contains the connection status type, the device endpoint,
//! the linear backoff configuration and the stream transport errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default device address on the cane's access point network
pub const DEFAULT_HOST: &str = "192.168.1.100";
/// Port of the device's HTTP command surface
pub const DEFAULT_COMMAND_PORT: u16 = 80;
/// Port of the device's WebSocket telemetry stream
pub const DEFAULT_STREAM_PORT: u16 = 81;

/// Connection status of the telemetry stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No live transport and no attempt in progress
    Disconnected,
    /// Transport is being opened
    Connecting,
    /// Transport is open and delivering telemetry
    Connected,
    /// Last transport failed to open or errored while open
    Error,
    /// Retry budget exhausted - manual reconnect required
    Failed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network location of the device: one host, two ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub command_port: u16,
    pub stream_port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            command_port: DEFAULT_COMMAND_PORT,
            stream_port: DEFAULT_STREAM_PORT,
        }
    }
}

impl Endpoint {
    /// Endpoint for `host` on the default firmware ports
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_command_port(mut self, port: u16) -> Self {
        self.command_port = port;
        self
    }

    pub fn with_stream_port(mut self, port: u16) -> Self {
        self.stream_port = port;
        self
    }

    /// `host:port`, with IPv6 literals bracketed
    fn authority(&self, port: u16) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, port)
        } else {
            format!("{}:{}", self.host, port)
        }
    }

    /// Base URL of the command surface, without trailing slash
    pub fn command_base_url(&self) -> String {
        format!("http://{}", self.authority(self.command_port))
    }

    /// Full URL for a command path; a missing leading slash is added
    pub fn command_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.command_base_url(), path)
        } else {
            format!("{}/{}", self.command_base_url(), path)
        }
    }

    /// WebSocket URL of the telemetry stream
    pub fn stream_url(&self) -> Result<Url, TransportError> {
        if self.host.trim().is_empty() {
            return Err(TransportError::InvalidEndpoint(
                "host must not be empty".to_string(),
            ));
        }

        let raw = format!("ws://{}/", self.authority(self.stream_port));
        let url = Url::parse(&raw)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{raw}: {e}")))?;

        // Host must be a bare address, not carry its own path
        if url.host_str().is_none() || url.path() != "/" {
            return Err(TransportError::InvalidEndpoint(raw));
        }

        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (commands :{}, stream :{})",
            self.host, self.command_port, self.stream_port
        )
    }
}

/// Reconnection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay unit; attempt `n` waits `base_delay * n`
    pub base_delay: Duration,
    /// Consecutive failed retries before the stream is marked failed
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Linear backoff: 1-indexed attempt `n` waits `base_delay * n`
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }

    /// Total time spent waiting if every retry fails
    pub fn calculate_max_total_time(&self) -> Duration {
        (1..=self.max_attempts)
            .map(|attempt| self.calculate_backoff_delay(attempt))
            .sum()
    }
}

/// Stream transport errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Invalid device endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Failed to open stream to {url}: {message}")]
    OpenFailed { url: String, message: String },
    #[error("Stream error: {0}")]
    Stream(String),
}
