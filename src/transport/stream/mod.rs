//! Device telemetry stream with automatic reconnection
//!
//! - [`connection`] - status, endpoint and backoff configuration
//! - [`reconnect`] - pure reconnection decisions and the retry timer slot
//! - [`machine`] - the connection state machine driving sessions
//! - [`websocket`] - WebSocket implementation of the stream transport
//!
//! # Usage
//!
//! ```rust,no_run
//! use navistick::{ClientConfig, DeviceClient, ConnectionStatus};
//!
//! # tokio_test::block_on(async {
//! let client = DeviceClient::new(&ClientConfig::default())?;
//! client.set_endpoint("192.168.4.1")?;
//! client.connect();
//!
//! let mut status = client.status_watch();
//! status.wait_for(|s| *s == ConnectionStatus::Connected).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod connection;
pub mod machine;
pub mod reconnect;
pub mod websocket;

pub use connection::{
    ConnectionStatus, Endpoint, ReconnectConfig, TransportError, DEFAULT_COMMAND_PORT,
    DEFAULT_HOST, DEFAULT_STREAM_PORT,
};
pub use machine::{ConnectionSnapshot, ConnectionStateMachine};
pub use reconnect::{ReconnectPolicy, ReconnectState, ReconnectionDecision, TransportSignal};
pub use websocket::WebSocketTransport;
