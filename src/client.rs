//! Device connectivity client
//!
//! [`DeviceClient`] is the one object the rest of an application depends on.
//! It owns the stream state machine, the listener registry, the command
//! dispatcher and the metrics for a single device. Construct it once and share
//! it as `Arc<DeviceClient>`.

use crate::commands::{
    CommandDispatcher, CommandError, SystemStatus, CALIBRATE_PATH, MAX_INTENSITY, VIBRATE_PATH,
    VIBRATOR_PATTERN_PATH,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{EventCategory, Listener, ListenerRegistry};
use crate::observability::{ClientMetrics, MetricsSnapshot};
use crate::telemetry::TelemetryClassifier;
use crate::transport::{
    ConnectionSnapshot, ConnectionStateMachine, ConnectionStatus, Endpoint, StreamTransport,
    WebSocketTransport,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct DeviceClient {
    machine: ConnectionStateMachine,
    registry: Arc<ListenerRegistry>,
    dispatcher: CommandDispatcher,
    metrics: Arc<ClientMetrics>,
}

impl DeviceClient {
    /// Build a client that streams over WebSocket
    ///
    /// Must be called from within a tokio runtime; the runtime is captured and
    /// used for session and retry tasks.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let transport = Arc::new(WebSocketTransport::new(config.connect_timeout()));
        Self::with_transport(config, transport)
    }

    /// Build a client over a caller-supplied stream transport
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn StreamTransport>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| ClientError::NoRuntime(e.to_string()))?;

        let registry = Arc::new(ListenerRegistry::new());
        let metrics = Arc::new(ClientMetrics::new());
        let machine = ConnectionStateMachine::new(
            config.endpoint(),
            config.reconnect_config(),
            transport,
            TelemetryClassifier::new(config.thresholds()),
            Arc::clone(&registry),
            Arc::clone(&metrics),
            runtime,
        );
        let dispatcher =
            CommandDispatcher::with_metrics(config.command_timeout(), Arc::clone(&metrics));

        let reconnect = config.reconnect_config();
        info!(
            endpoint = %config.endpoint(),
            max_attempts = reconnect.max_attempts,
            retry_window_ms = reconnect.calculate_max_total_time().as_millis() as u64,
            "Device client created"
        );

        Ok(Self {
            machine,
            registry,
            dispatcher,
            metrics,
        })
    }

    /// Point the client at a new host, keeping the configured ports
    pub fn set_endpoint(&self, host: impl Into<String>) -> ClientResult<()> {
        let current = self.machine.endpoint();
        self.set_endpoint_full(Endpoint {
            host: host.into(),
            ..current
        })
    }

    /// Replace host and ports; an endpoint without a usable stream URL is rejected
    pub fn set_endpoint_full(&self, endpoint: Endpoint) -> ClientResult<()> {
        endpoint.stream_url()?;
        self.machine.set_endpoint(endpoint);
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        self.machine.endpoint()
    }

    pub fn connect(&self) {
        self.machine.connect();
    }

    /// Close the stream, cancel pending retries and drop every listener
    pub fn disconnect(&self) {
        self.machine.disconnect();
    }

    pub fn connection_status(&self) -> ConnectionSnapshot {
        self.machine.snapshot()
    }

    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.machine.status_watch()
    }

    pub fn subscribe(&self, category: EventCategory, listener: Listener) {
        self.registry.subscribe(category, listener);
    }

    /// Remove one registration of `listener`; returns false if none matched
    pub fn unsubscribe(&self, category: EventCategory, listener: &Listener) -> bool {
        self.registry.unsubscribe(category, listener)
    }

    pub fn listener_count(&self, category: EventCategory) -> usize {
        self.registry.listener_count(category)
    }

    /// POST an arbitrary JSON payload to the command surface
    pub async fn send_command(&self, path: &str, payload: Value) -> Result<Value, CommandError> {
        self.dispatcher
            .send(&self.machine.endpoint(), path, &payload)
            .await
    }

    /// Run a vibration pattern; intensity is clamped to 0..=100
    pub async fn activate_vibration(
        &self,
        pattern: &str,
        intensity: i64,
    ) -> Result<Value, CommandError> {
        let clamped = intensity.clamp(0, i64::from(MAX_INTENSITY));
        if clamped != intensity {
            debug!(requested = intensity, clamped, "Vibration intensity clamped");
        }
        self.send_command(
            VIBRATE_PATH,
            json!({ "pattern": pattern, "intensity": clamped }),
        )
        .await
    }

    pub async fn set_vibrator_pattern(&self, pattern: &str) -> Result<Value, CommandError> {
        self.send_command(VIBRATOR_PATTERN_PATH, json!({ "pattern": pattern }))
            .await
    }

    pub async fn calibrate_sensors(&self) -> Result<Value, CommandError> {
        self.send_command(CALIBRATE_PATH, json!({})).await
    }

    pub async fn get_system_status(&self) -> Result<SystemStatus, CommandError> {
        self.dispatcher.get_status(&self.machine.endpoint()).await
    }

    /// Check that the command surface answers at all
    pub async fn probe(&self) -> Result<(), CommandError> {
        self.dispatcher.probe(&self.machine.endpoint()).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
