//! NaviStick device client
//!
//! Connects a monitoring application to a NaviStick smart cane on the local
//! network.
//!
//! # Overview
//!
//! - A persistent WebSocket stream carries sensor telemetry, reconnecting
//!   with linear backoff until a retry ceiling is reached
//! - Raw frames are classified into typed [`TelemetryEvent`]s with derived
//!   obstacle and stair flags
//! - Events fan out to listeners registered per [`EventCategory`]
//! - Actuator commands are one-shot HTTP requests independent of the stream
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use navistick::{listener, ClientConfig, DeviceClient, DeviceEvent, EventCategory};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DeviceClient::new(&ClientConfig::default())?;
//!
//! client.subscribe(
//!     EventCategory::Ultrasonic,
//!     listener(|event: &DeviceEvent| {
//!         println!("{}", serde_json::to_string(event).unwrap_or_default());
//!         Ok(())
//!     }),
//! );
//! client.connect();
//!
//! client.activate_vibration("obstacle", 80).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod observability;
pub mod telemetry;
pub mod testing;
pub mod transport;

pub use client::DeviceClient;
pub use commands::{CommandError, CommandErrorKind, SystemStatus};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use events::{
    listener, ConnectionEvent, DeviceEvent, EventCategory, Listener, ListenerError,
    ListenerResult,
};
pub use observability::MetricsSnapshot;
pub use telemetry::{TelemetryEvent, Thresholds};
pub use transport::{ConnectionSnapshot, ConnectionStatus, Endpoint, ReconnectConfig};
