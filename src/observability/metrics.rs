//! Per-client metrics
//!
//! Atomic counters for the telemetry stream, event dispatch and the command
//! surface. Each [`DeviceClient`](crate::DeviceClient) owns one collector.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_LATENCY_SAMPLES: usize = 1000;

/// Thread-safe counters shared by the stream task and command callers
#[derive(Debug)]
pub struct ClientMetrics {
    // Stream
    stream_connected: AtomicBool,
    connection_attempts: AtomicU64,
    connections_established: AtomicU64,
    connection_failures: AtomicU64,
    connection_start_time: AtomicU64,
    messages_received: AtomicU64,
    parse_failures: AtomicU64,
    last_message_time: AtomicU64,

    // Dispatch
    events_published: AtomicU64,
    listener_failures: AtomicU64,

    // Commands
    commands_sent: AtomicU64,
    command_failures: AtomicU64,
    command_timeouts: AtomicU64,
    command_latencies: Mutex<Vec<u64>>,

    created_at: AtomicU64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self {
            stream_connected: AtomicBool::new(false),
            connection_attempts: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            connection_start_time: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            last_message_time: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            command_failures: AtomicU64::new(0),
            command_timeouts: AtomicU64::new(0),
            command_latencies: Mutex::new(Vec::new()),
            created_at: AtomicU64::new(current_timestamp()),
        }
    }

    pub fn connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.stream_connected.store(true, Ordering::Relaxed);
        self.connection_start_time
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
        self.connection_lost();
    }

    pub fn connection_lost(&self) {
        self.stream_connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.last_message_time
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn parse_failed(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_published(&self, listener_failures: usize) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.listener_failures
            .fetch_add(listener_failures as u64, Ordering::Relaxed);
    }

    pub fn command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_completed(&self, latency: Duration) {
        let mut latencies = self
            .command_latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        latencies.push(latency.as_millis() as u64);
        if latencies.len() > MAX_LATENCY_SAMPLES {
            latencies.remove(0);
        }
    }

    pub fn command_failed(&self, timed_out: bool) {
        self.command_failures.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.command_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn latency_statistics(&self) -> (f64, f64, f64) {
        let mut sorted = self
            .command_latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if sorted.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        sorted.sort_unstable();

        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (avg, percentile(&sorted, 50.0), percentile(&sorted, 95.0))
    }

    fn connection_duration(&self, now: u64) -> u64 {
        if !self.stream_connected.load(Ordering::Relaxed) {
            return 0;
        }
        let start = self.connection_start_time.load(Ordering::Relaxed);
        if start > 0 {
            now.saturating_sub(start)
        } else {
            0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_latency_ms, latency_p50_ms, latency_p95_ms) = self.latency_statistics();

        MetricsSnapshot {
            stream: StreamMetrics {
                connected: self.stream_connected.load(Ordering::Relaxed),
                connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
                connections_established: self.connections_established.load(Ordering::Relaxed),
                connection_failures: self.connection_failures.load(Ordering::Relaxed),
                messages_received: self.messages_received.load(Ordering::Relaxed),
                parse_failures: self.parse_failures.load(Ordering::Relaxed),
                last_message_time: self.last_message_time.load(Ordering::Relaxed),
                connection_duration_seconds: self.connection_duration(now),
            },
            events: EventMetrics {
                events_published: self.events_published.load(Ordering::Relaxed),
                listener_failures: self.listener_failures.load(Ordering::Relaxed),
            },
            commands: CommandMetrics {
                commands_sent: self.commands_sent.load(Ordering::Relaxed),
                command_failures: self.command_failures.load(Ordering::Relaxed),
                command_timeouts: self.command_timeouts.load(Ordering::Relaxed),
                avg_latency_ms,
                latency_p50_ms,
                latency_p95_ms,
            },
            uptime_seconds: now.saturating_sub(self.created_at.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub stream: StreamMetrics,
    pub events: EventMetrics,
    pub commands: CommandMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamMetrics {
    pub connected: bool,
    pub connection_attempts: u64,
    pub connections_established: u64,
    pub connection_failures: u64,
    pub messages_received: u64,
    pub parse_failures: u64,
    pub last_message_time: u64,
    pub connection_duration_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMetrics {
    pub events_published: u64,
    pub listener_failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandMetrics {
    pub commands_sent: u64,
    pub command_failures: u64,
    pub command_timeouts: u64,
    pub avg_latency_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;

    lower + (upper - lower) * index.fract()
}
