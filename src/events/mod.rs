//! Typed event bus
//!
//! Every event delivered to observers is a [`DeviceEvent`], keyed for
//! subscription by its [`EventCategory`].

pub mod registry;

pub use registry::{listener, Listener, ListenerError, ListenerRegistry, ListenerResult, PublishReport};

use crate::telemetry::TelemetryEvent;
use crate::transport::ConnectionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Connection,
    Ultrasonic,
    Tof,
    Vibrator,
    Gps,
    Imu,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        EventCategory::Connection,
        EventCategory::Ultrasonic,
        EventCategory::Tof,
        EventCategory::Vibrator,
        EventCategory::Gps,
        EventCategory::Imu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Connection => "connection",
            EventCategory::Ultrasonic => "ultrasonic",
            EventCategory::Tof => "tof",
            EventCategory::Vibrator => "vibrator",
            EventCategory::Gps => "gps",
            EventCategory::Imu => "imu",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection status change as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionEvent {
    pub fn new(status: ConnectionStatus) -> Self {
        Self {
            status,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_error(status: ConnectionStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Anything delivered to a listener
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceEvent {
    Connection(ConnectionEvent),
    Telemetry(TelemetryEvent),
}

impl DeviceEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            DeviceEvent::Connection(_) => EventCategory::Connection,
            DeviceEvent::Telemetry(TelemetryEvent::Ultrasonic(_)) => EventCategory::Ultrasonic,
            DeviceEvent::Telemetry(TelemetryEvent::Tof(_)) => EventCategory::Tof,
            DeviceEvent::Telemetry(TelemetryEvent::Vibrator(_)) => EventCategory::Vibrator,
            DeviceEvent::Telemetry(TelemetryEvent::Gps(_)) => EventCategory::Gps,
            DeviceEvent::Telemetry(TelemetryEvent::Imu(_)) => EventCategory::Imu,
        }
    }

    pub fn as_connection(&self) -> Option<&ConnectionEvent> {
        match self {
            DeviceEvent::Connection(event) => Some(event),
            DeviceEvent::Telemetry(_) => None,
        }
    }

    pub fn as_telemetry(&self) -> Option<&TelemetryEvent> {
        match self {
            DeviceEvent::Telemetry(event) => Some(event),
            DeviceEvent::Connection(_) => None,
        }
    }
}

impl From<ConnectionEvent> for DeviceEvent {
    fn from(event: ConnectionEvent) -> Self {
        DeviceEvent::Connection(event)
    }
}

impl From<TelemetryEvent> for DeviceEvent {
    fn from(event: TelemetryEvent) -> Self {
        DeviceEvent::Telemetry(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{GpsFix, ImuReading, TofReading, UltrasonicReading, Vector3, VibratorState};

    #[test]
    fn test_category_mapping() {
        let now = Utc::now();
        let cases = vec![
            (
                DeviceEvent::from(ConnectionEvent::new(ConnectionStatus::Connected)),
                EventCategory::Connection,
            ),
            (
                DeviceEvent::from(TelemetryEvent::Ultrasonic(UltrasonicReading {
                    distance: 40.0,
                    obstacle: true,
                    timestamp: now,
                })),
                EventCategory::Ultrasonic,
            ),
            (
                DeviceEvent::from(TelemetryEvent::Tof(TofReading {
                    distance: 10.0,
                    stair: false,
                    timestamp: now,
                })),
                EventCategory::Tof,
            ),
            (
                DeviceEvent::from(TelemetryEvent::Vibrator(VibratorState {
                    pattern: "none".to_string(),
                    intensity: 0.0,
                    active: false,
                    timestamp: now,
                })),
                EventCategory::Vibrator,
            ),
            (
                DeviceEvent::from(TelemetryEvent::Gps(GpsFix {
                    latitude: 0.0,
                    longitude: 0.0,
                    accuracy: 0.0,
                    timestamp: now,
                })),
                EventCategory::Gps,
            ),
            (
                DeviceEvent::from(TelemetryEvent::Imu(ImuReading {
                    acceleration: Vector3::default(),
                    gyroscope: Vector3::default(),
                    orientation: 0.0,
                    timestamp: now,
                })),
                EventCategory::Imu,
            ),
        ];

        for (event, category) in cases {
            assert_eq!(event.category(), category);
        }
    }

    #[test]
    fn test_connection_event_serialization() {
        let event = ConnectionEvent::with_error(ConnectionStatus::Error, "refused");
        let json = serde_json::to_value(DeviceEvent::from(event)).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "refused");
        assert!(json["timestamp"].is_string());

        let json = serde_json::to_value(ConnectionEvent::new(ConnectionStatus::Failed)).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_category_display() {
        let names: Vec<String> = EventCategory::ALL.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["connection", "ultrasonic", "tof", "vibrator", "gps", "imu"]);
    }
}
