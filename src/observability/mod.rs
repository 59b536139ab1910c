//! Observability: structured logging and per-client metrics

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{ClientMetrics, CommandMetrics, EventMetrics, MetricsSnapshot, StreamMetrics};

pub use logging::{command_span, stream_span};
