//! One-shot HTTP commands to the device
//!
//! Each call is a single request with a fixed timeout and no retry. Commands
//! never go through the stream state machine, so they work whether or not
//! telemetry is connected.

use super::status::SystemStatus;
use crate::observability::ClientMetrics;
use crate::transport::Endpoint;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn, Instrument};

/// Default command timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(5000);

/// Command failures surfaced to the caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Network error calling {path}: {message}")]
    Network { path: String, message: String },
    #[error("Device answered {path} with HTTP {status}")]
    HttpStatus { path: String, status: u16 },
    #[error("Command {path} timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },
    #[error("Invalid response from {path}: {message}")]
    InvalidResponse { path: String, message: String },
}

/// Coarse classification of a [`CommandError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandErrorKind {
    Network,
    HttpStatus,
    Timeout,
    InvalidResponse,
}

impl CommandError {
    pub fn kind(&self) -> CommandErrorKind {
        match self {
            CommandError::Network { .. } => CommandErrorKind::Network,
            CommandError::HttpStatus { .. } => CommandErrorKind::HttpStatus,
            CommandError::Timeout { .. } => CommandErrorKind::Timeout,
            CommandError::InvalidResponse { .. } => CommandErrorKind::InvalidResponse,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            CommandError::Network { path, .. }
            | CommandError::HttpStatus { path, .. }
            | CommandError::Timeout { path, .. }
            | CommandError::InvalidResponse { path, .. } => path,
        }
    }
}

/// Issues requests against the device's command surface
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    client: reqwest::Client,
    timeout: Duration,
    metrics: Arc<ClientMetrics>,
}

impl CommandDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self::with_metrics(timeout, Arc::new(ClientMetrics::new()))
    }

    pub fn with_metrics(timeout: Duration, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            metrics,
        }
    }

    /// POST `payload` as JSON to `path` and return the decoded response body
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        path: &str,
        payload: &Value,
    ) -> Result<Value, CommandError> {
        let request = self.client.post(endpoint.command_url(path)).json(payload);
        let body = self
            .execute("POST", path, request)
            .instrument(crate::command_span!(method = "POST", path = %path))
            .await?;
        Ok(parse_body(&body))
    }

    /// GET `path` and return the decoded response body
    pub async fn get(&self, endpoint: &Endpoint, path: &str) -> Result<Value, CommandError> {
        let request = self.client.get(endpoint.command_url(path));
        let body = self
            .execute("GET", path, request)
            .instrument(crate::command_span!(method = "GET", path = %path))
            .await?;
        Ok(parse_body(&body))
    }

    /// GET `/status` decoded into a [`SystemStatus`]
    pub async fn get_status(&self, endpoint: &Endpoint) -> Result<SystemStatus, CommandError> {
        let body = self.get(endpoint, super::STATUS_PATH).await?;
        serde_json::from_value(body).map_err(|e| CommandError::InvalidResponse {
            path: super::STATUS_PATH.to_string(),
            message: e.to_string(),
        })
    }

    /// GET `/`; success means the command surface answered with 2xx
    pub async fn probe(&self, endpoint: &Endpoint) -> Result<(), CommandError> {
        self.get(endpoint, super::ROOT_PATH).await.map(|_| ())
    }

    async fn execute(
        &self,
        method: &str,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, CommandError> {
        self.metrics.command_sent();
        let started = Instant::now();

        let result = self.round_trip(path, request).await;
        match &result {
            Ok(_) => {
                let elapsed = started.elapsed();
                self.metrics.command_completed(elapsed);
                debug!(method, elapsed_ms = elapsed.as_millis() as u64, "Command completed");
            }
            Err(e) => {
                self.metrics
                    .command_failed(e.kind() == CommandErrorKind::Timeout);
                warn!(method, error = %e, "Command failed");
            }
        }
        result
    }

    async fn round_trip(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, CommandError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommandError::HttpStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| self.request_error(path, e))
    }

    fn request_error(&self, path: &str, error: reqwest::Error) -> CommandError {
        if error.is_timeout() {
            CommandError::Timeout {
                path: path.to_string(),
                timeout: self.timeout,
            }
        } else {
            CommandError::Network {
                path: path.to_string(),
                message: error.to_string(),
            }
        }
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

/// Decode a response body: JSON as-is, empty as null, anything else as a string
pub fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
