//! Typed sensor readings decoded from the device stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor discriminator carried in the `sensor` field of every frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorKind {
    Ultrasonic,
    Tof,
    Vibrator,
    Gps,
    Imu,
    Unknown(String),
}

impl SensorKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ultrasonic" => SensorKind::Ultrasonic,
            "tof" => SensorKind::Tof,
            "vibrator" => SensorKind::Vibrator,
            "gps" => SensorKind::Gps,
            "imu" => SensorKind::Imu,
            other => SensorKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SensorKind::Ultrasonic => "ultrasonic",
            SensorKind::Tof => "tof",
            SensorKind::Vibrator => "vibrator",
            SensorKind::Gps => "gps",
            SensorKind::Imu => "imu",
            SensorKind::Unknown(other) => other,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forward distance reading with obstacle flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltrasonicReading {
    /// Centimetres
    pub distance: f64,
    /// `distance` below the ultrasonic threshold
    pub obstacle: bool,
    pub timestamp: DateTime<Utc>,
}

/// Downward distance reading with stair flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TofReading {
    /// Centimetres
    pub distance: f64,
    /// `distance` above the ToF threshold, i.e. the floor dropped away
    pub stair: bool,
    pub timestamp: DateTime<Utc>,
}

/// Haptic actuator state as reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibratorState {
    pub pattern: String,
    /// 0-100 as reported; not range checked on the way in
    pub intensity: f64,
    pub active: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    pub acceleration: Vector3,
    pub gyroscope: Vector3,
    /// Compass heading in degrees
    pub orientation: f64,
    pub timestamp: DateTime<Utc>,
}

/// A classified telemetry frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "sensor", rename_all = "lowercase")]
pub enum TelemetryEvent {
    Ultrasonic(UltrasonicReading),
    Tof(TofReading),
    Vibrator(VibratorState),
    Gps(GpsFix),
    Imu(ImuReading),
}

impl TelemetryEvent {
    pub fn sensor(&self) -> SensorKind {
        match self {
            TelemetryEvent::Ultrasonic(_) => SensorKind::Ultrasonic,
            TelemetryEvent::Tof(_) => SensorKind::Tof,
            TelemetryEvent::Vibrator(_) => SensorKind::Vibrator,
            TelemetryEvent::Gps(_) => SensorKind::Gps,
            TelemetryEvent::Imu(_) => SensorKind::Imu,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TelemetryEvent::Ultrasonic(reading) => reading.timestamp,
            TelemetryEvent::Tof(reading) => reading.timestamp,
            TelemetryEvent::Vibrator(state) => state.timestamp,
            TelemetryEvent::Gps(fix) => fix.timestamp,
            TelemetryEvent::Imu(reading) => reading.timestamp,
        }
    }
}
