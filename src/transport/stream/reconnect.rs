//! Pure reconnection decisions for the device stream
//!
//! Decision making is kept free of I/O so that the state machine only has to
//! apply the outcome. [`ReconnectState`] owns the retry counter and the single
//! pending retry timer.

use super::connection::{ConnectionStatus, ReconnectConfig};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pure reconnection decision logic
pub struct ReconnectPolicy;

impl ReconnectPolicy {
    /// Decide what to do after the stream closed or errored
    ///
    /// `current_attempts` is the number of retries already scheduled since the
    /// last successful open.
    pub fn should_attempt_reconnection(
        status: ConnectionStatus,
        current_attempts: u32,
        config: &ReconnectConfig,
        retry_suppressed: bool,
    ) -> ReconnectionDecision {
        if retry_suppressed {
            return ReconnectionDecision::AbortSuppressed;
        }

        if status == ConnectionStatus::Failed {
            return ReconnectionDecision::AbortAlreadyFailed;
        }

        if current_attempts >= config.max_attempts {
            return ReconnectionDecision::AbortMaxAttemptsExceeded;
        }

        let attempt = current_attempts + 1;
        ReconnectionDecision::Proceed {
            attempt,
            delay: config.calculate_backoff_delay(attempt),
        }
    }

    /// Whether `connect()` may start a new attempt from this status
    pub fn can_connect(status: ConnectionStatus) -> bool {
        !matches!(
            status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        )
    }

    /// Determine next status after a transport signal
    pub fn determine_next_state(current: ConnectionStatus, signal: &TransportSignal) -> ConnectionStatus {
        match signal {
            TransportSignal::OpenRequested => ConnectionStatus::Connecting,
            TransportSignal::Opened => ConnectionStatus::Connected,
            TransportSignal::Closed if current == ConnectionStatus::Failed => current,
            TransportSignal::Closed => ConnectionStatus::Disconnected,
            TransportSignal::Errored(_) if current == ConnectionStatus::Failed => current,
            TransportSignal::Errored(_) => ConnectionStatus::Error,
            TransportSignal::RetriesExhausted => ConnectionStatus::Failed,
            TransportSignal::DisconnectRequested => ConnectionStatus::Disconnected,
        }
    }

    pub fn log_state_transition(from: ConnectionStatus, to: ConnectionStatus) {
        match (from, to) {
            (ConnectionStatus::Connecting, ConnectionStatus::Connected) => {
                info!("Device stream connected");
            }
            (ConnectionStatus::Connected, ConnectionStatus::Disconnected) => {
                warn!("Device stream closed");
            }
            (_, ConnectionStatus::Error) => {
                warn!(from = %from, "Device stream error");
            }
            (_, ConnectionStatus::Failed) => {
                error!("Device stream permanently failed, manual reconnect required");
            }
            _ => {
                debug!(from = %from, to = %to, "Device stream status changed");
            }
        }
    }

    pub fn validate_config(config: &ReconnectConfig) -> Result<(), String> {
        if config.base_delay.is_zero() {
            return Err("base_delay must be greater than 0".to_string());
        }
        if config.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Schedule retry number `attempt` after `delay`
    Proceed { attempt: u32, delay: Duration },
    /// Caller asked for the stream to stay down
    AbortSuppressed,
    /// Stream is already failed, nothing more to do
    AbortAlreadyFailed,
    /// Retry budget exhausted - transition to failed
    AbortMaxAttemptsExceeded,
}

/// Signals that drive status transitions
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    OpenRequested,
    Opened,
    Closed,
    Errored(String),
    RetriesExhausted,
    DisconnectRequested,
}

/// Retry counter plus at most one pending retry timer
#[derive(Debug, Default)]
pub struct ReconnectState {
    attempts: u32,
    pending: Option<JoinHandle<()>>,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a scheduled retry and install its timer, cancelling any older one
    pub fn schedule(&mut self, attempt: u32, timer: JoinHandle<()>) {
        self.cancel_pending();
        self.attempts = attempt;
        self.pending = Some(timer);
    }

    /// Successful open: counter back to zero, no retry outstanding
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.cancel_pending();
    }

    /// Abort the pending timer if any; returns whether one was cancelled
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Detach the pending handle without aborting it
    ///
    /// Used by the timer task itself once it fires, so that the connect it
    /// triggers does not abort the running task.
    pub fn take_pending(&mut self) -> Option<JoinHandle<()>> {
        self.pending.take()
    }
}

impl Drop for ReconnectState {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
