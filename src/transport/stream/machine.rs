//! Connection state machine for the device stream
//!
//! The machine is the only writer of [`ConnectionStatus`]. Each `connect()`
//! starts a session task tagged with a generation number; callbacks from a
//! session whose generation is no longer current are ignored. Shared state
//! lives behind a std mutex that is never held across an `.await` nor while
//! listeners run.

use super::connection::{ConnectionStatus, Endpoint, ReconnectConfig, TransportError};
use super::reconnect::{ReconnectPolicy, ReconnectState, ReconnectionDecision, TransportSignal};
use crate::events::{ConnectionEvent, DeviceEvent, ListenerRegistry};
use crate::observability::ClientMetrics;
use crate::telemetry::TelemetryClassifier;
use crate::transport::{StreamConnection, StreamTransport};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Point-in-time view of the stream connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub endpoint: Endpoint,
}

struct Session {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Session {
    /// Ask the session to close its transport and exit
    fn stop(self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn abort(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

struct MachineState {
    status: ConnectionStatus,
    endpoint: Endpoint,
    reconnect: ReconnectState,
    retry_suppressed: bool,
    generation: u64,
    session: Option<Session>,
}

enum SessionStep {
    Shutdown,
    Frame(Option<Result<String, TransportError>>),
}

struct MachineCore {
    state: Mutex<MachineState>,
    status_tx: watch::Sender<ConnectionStatus>,
    transport: Arc<dyn StreamTransport>,
    classifier: TelemetryClassifier,
    registry: Arc<ListenerRegistry>,
    metrics: Arc<ClientMetrics>,
    config: ReconnectConfig,
    runtime: Handle,
}

/// Owns the stream transport and drives connect, disconnect and reconnect
pub struct ConnectionStateMachine {
    core: Arc<MachineCore>,
}

impl ConnectionStateMachine {
    pub fn new(
        endpoint: Endpoint,
        config: ReconnectConfig,
        transport: Arc<dyn StreamTransport>,
        classifier: TelemetryClassifier,
        registry: Arc<ListenerRegistry>,
        metrics: Arc<ClientMetrics>,
        runtime: Handle,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);

        Self {
            core: Arc::new(MachineCore {
                state: Mutex::new(MachineState {
                    status: ConnectionStatus::Disconnected,
                    endpoint,
                    reconnect: ReconnectState::new(),
                    retry_suppressed: false,
                    generation: 0,
                    session: None,
                }),
                status_tx,
                transport,
                classifier,
                registry,
                metrics,
                config,
                runtime,
            }),
        }
    }

    /// Start a session unless one is already connecting or connected
    pub fn connect(&self) {
        self.core.connect();
    }

    /// Stop the stream, cancel any pending retry and drop all listeners
    ///
    /// No connection event is emitted for a requested disconnect.
    pub fn disconnect(&self) {
        self.core.disconnect();
    }

    /// Replace the endpoint used by the next connect
    ///
    /// A live session keeps talking to the old endpoint.
    pub fn set_endpoint(&self, endpoint: Endpoint) {
        let mut state = self.core.lock_state();
        if state.endpoint != endpoint {
            info!(endpoint = %endpoint, "Device endpoint updated");
            state.endpoint = endpoint;
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.core.lock_state().endpoint.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.core.lock_state().status
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.core.lock_state();
        ConnectionSnapshot {
            status: state.status,
            reconnect_attempts: state.reconnect.attempts(),
            endpoint: state.endpoint.clone(),
        }
    }

    /// Receiver that observes every status change
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.core.status_tx.subscribe()
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.core.config
    }
}

impl Drop for ConnectionStateMachine {
    fn drop(&mut self) {
        let mut state = self.core.lock_state();
        state.retry_suppressed = true;
        state.generation += 1;
        state.reconnect.cancel_pending();
        if let Some(session) = state.session.take() {
            session.abort();
        }
    }
}

impl MachineCore {
    fn lock_state(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a transport signal; callers hold the state lock
    fn transition(&self, state: &mut MachineState, signal: &TransportSignal) {
        let next = ReconnectPolicy::determine_next_state(state.status, signal);
        if next != state.status {
            ReconnectPolicy::log_state_transition(state.status, next);
            state.status = next;
            self.status_tx.send_replace(next);
        }
    }

    fn publish(&self, event: DeviceEvent) {
        let report = self.registry.publish(&event);
        self.metrics.event_published(report.failed);
    }

    fn connect(self: &Arc<Self>) {
        let mut state = self.lock_state();
        self.connect_locked(&mut state);
    }

    /// Start a session while the caller holds the state lock
    fn connect_locked(self: &Arc<Self>, state: &mut MachineState) {
        if !ReconnectPolicy::can_connect(state.status) {
            debug!(status = %state.status, "Connect ignored, stream already active");
            return;
        }

        state.retry_suppressed = false;
        state.reconnect.cancel_pending();
        state.generation += 1;
        let generation = state.generation;
        let endpoint = state.endpoint.clone();
        self.transition(state, &TransportSignal::OpenRequested);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let span = crate::stream_span!(
            generation,
            host = %endpoint.host,
            port = endpoint.stream_port
        );
        let handle = self.runtime.spawn(
            Arc::clone(self)
                .run_session(generation, endpoint, shutdown_rx)
                .instrument(span),
        );

        if let Some(previous) = state.session.replace(Session {
            shutdown_tx,
            handle,
        }) {
            previous.stop();
        }
    }

    fn disconnect(&self) {
        let session = {
            let mut state = self.lock_state();
            state.retry_suppressed = true;
            state.generation += 1;
            let cancelled_retry = state.reconnect.cancel_pending();
            self.transition(&mut state, &TransportSignal::DisconnectRequested);
            debug!(cancelled_retry, "Disconnect requested");
            state.session.take()
        };

        if let Some(session) = session {
            session.stop();
        }
        self.metrics.connection_lost();
        self.registry.clear();
        info!("Device stream disconnected");
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_state().generation == generation
    }

    async fn run_session(
        self: Arc<Self>,
        generation: u64,
        endpoint: Endpoint,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        self.metrics.connection_attempt();

        let url = match endpoint.stream_url() {
            Ok(url) => url,
            Err(e) => {
                self.on_error(generation, e);
                return;
            }
        };

        let opened = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                debug!("Session cancelled before the stream opened");
                return;
            }
            result = self.transport.open(url.as_str()) => result,
        };

        let mut connection: Box<dyn StreamConnection> = match opened {
            Ok(connection) => connection,
            Err(e) => {
                self.on_error(generation, e);
                return;
            }
        };

        if !self.on_open(generation) {
            connection.close().await;
            return;
        }

        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => SessionStep::Shutdown,
                frame = connection.next_frame() => SessionStep::Frame(frame),
            };

            match step {
                SessionStep::Shutdown => {
                    debug!("Closing stream on request");
                    connection.close().await;
                    return;
                }
                SessionStep::Frame(Some(Ok(text))) => self.on_message(generation, &text),
                SessionStep::Frame(Some(Err(e))) => {
                    connection.close().await;
                    self.on_error(generation, e);
                    return;
                }
                SessionStep::Frame(None) => {
                    self.on_close(generation);
                    return;
                }
            }
        }
    }

    /// Returns false when the session was superseded while opening
    fn on_open(&self, generation: u64) -> bool {
        {
            let mut state = self.lock_state();
            if state.generation != generation {
                debug!(generation, "Discarding stream opened by a stale session");
                return false;
            }
            state.reconnect.reset();
            self.transition(&mut state, &TransportSignal::Opened);
        }

        self.metrics.connection_established();
        self.publish(ConnectionEvent::new(ConnectionStatus::Connected).into());
        true
    }

    fn on_message(&self, generation: u64, text: &str) {
        if !self.is_current(generation) {
            return;
        }
        self.metrics.message_received();

        match self.classifier.classify(text) {
            Ok(Some(event)) => self.publish(DeviceEvent::Telemetry(event)),
            Ok(None) => {}
            Err(e) => {
                self.metrics.parse_failed();
                warn!(error = %e, "Dropping malformed telemetry frame");
            }
        }
    }

    fn on_close(self: &Arc<Self>, generation: u64) {
        {
            let mut state = self.lock_state();
            if state.generation != generation || state.status == ConnectionStatus::Failed {
                debug!(generation, "Ignoring close from an inactive session");
                return;
            }
            self.transition(&mut state, &TransportSignal::Closed);
        }

        self.metrics.connection_lost();
        self.publish(ConnectionEvent::new(ConnectionStatus::Disconnected).into());
        self.schedule_reconnect(generation);
    }

    fn on_error(self: &Arc<Self>, generation: u64, err: TransportError) {
        let message = err.to_string();
        {
            let mut state = self.lock_state();
            if state.generation != generation || state.status == ConnectionStatus::Failed {
                debug!(generation, error = %message, "Ignoring error from an inactive session");
                return;
            }
            self.transition(&mut state, &TransportSignal::Errored(message.clone()));
        }

        warn!(error = %message, "Device stream error");
        self.metrics.connection_failed();
        self.publish(ConnectionEvent::with_error(ConnectionStatus::Error, message).into());
        self.schedule_reconnect(generation);
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock_state();
        if state.generation != generation {
            debug!(generation, "Session superseded, no reconnection scheduled");
            return;
        }

        let decision = ReconnectPolicy::should_attempt_reconnection(
            state.status,
            state.reconnect.attempts(),
            &self.config,
            state.retry_suppressed,
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay } => {
                let core = Arc::clone(self);
                let timer = self.runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    core.fire_retry(generation);
                });
                state.reconnect.schedule(attempt, timer);
                info!(
                    attempt,
                    max_attempts = self.config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnection attempt"
                );
            }
            ReconnectionDecision::AbortSuppressed | ReconnectionDecision::AbortAlreadyFailed => {
                debug!(?decision, "No reconnection scheduled");
            }
            ReconnectionDecision::AbortMaxAttemptsExceeded => {
                self.transition(&mut state, &TransportSignal::RetriesExhausted);
                let attempts = state.reconnect.attempts();
                drop(state);

                error!(attempts, "Reconnection attempts exhausted");
                self.publish(ConnectionEvent::new(ConnectionStatus::Failed).into());
            }
        }
    }

    fn fire_retry(self: &Arc<Self>, generation: u64) {
        // Generation check and connect share one guard
        let mut state = self.lock_state();
        if state.generation != generation || state.retry_suppressed {
            debug!(generation, "Discarding stale reconnection timer");
            return;
        }
        // The timer is this task; detach it so connect_locked() does not abort it
        state.reconnect.take_pending();

        debug!(generation, "Reconnection timer fired");
        self.connect_locked(&mut state);
    }
}
