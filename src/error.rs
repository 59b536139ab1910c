//! Top-level error type for the device client
//!
//! Each layer keeps its own error enum; [`ClientError`] wraps them for callers
//! that only care that a client operation failed.

use thiserror::Error;

pub use crate::commands::{CommandError, CommandErrorKind};
pub use crate::config::ConfigError;
pub use crate::events::ListenerError;
pub use crate::telemetry::ParseError;
pub use crate::transport::TransportError;

/// Main error type for client operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Result alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
