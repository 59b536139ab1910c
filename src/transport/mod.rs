//! Transport layer for the device telemetry stream
//!
//! The [`StreamTransport`] trait abstracts how a stream is opened so that the
//! connection state machine can be driven by a real WebSocket or by a
//! scripted test double.

pub mod stream;

pub use stream::{
    ConnectionSnapshot, ConnectionStateMachine, ConnectionStatus, Endpoint, ReconnectConfig,
    ReconnectPolicy, ReconnectionDecision, TransportError, WebSocketTransport,
    DEFAULT_COMMAND_PORT, DEFAULT_HOST, DEFAULT_STREAM_PORT,
};

/// Opens stream sessions to the device
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open one session to `url`; the returned connection is owned by the caller
    async fn open(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError>;
}

/// One open stream session
#[async_trait::async_trait]
pub trait StreamConnection: Send {
    /// Next text frame
    ///
    /// `None` means the peer closed the session cleanly; `Some(Err(_))` is a
    /// transport error after which the session is unusable.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the session, best effort
    async fn close(&mut self);
}
