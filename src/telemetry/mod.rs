//! Telemetry decoding for the device stream
//!
//! - [`readings`] - typed sensor readings and the [`TelemetryEvent`] union
//! - [`classifier`] - raw frame to typed event, with derived flags

pub mod classifier;
pub mod readings;

pub use classifier::{
    ParseError, TelemetryClassifier, Thresholds, DEFAULT_TOF_THRESHOLD_CM,
    DEFAULT_ULTRASONIC_THRESHOLD_CM,
};
pub use readings::{
    GpsFix, ImuReading, SensorKind, TelemetryEvent, TofReading, UltrasonicReading, Vector3,
    VibratorState,
};
