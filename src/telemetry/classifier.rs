//! Telemetry classification
//!
//! Turns a raw stream frame into a typed [`TelemetryEvent`]: validates the
//! JSON shape, stamps the capture time and derives the obstacle and stair
//! flags from the configured thresholds.

use super::readings::{
    GpsFix, ImuReading, SensorKind, TelemetryEvent, TofReading, UltrasonicReading, Vector3,
    VibratorState,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Readings below this many centimetres ahead count as an obstacle
pub const DEFAULT_ULTRASONIC_THRESHOLD_CM: f64 = 100.0;
/// Readings above this many centimetres downward count as a stair or drop
pub const DEFAULT_TOF_THRESHOLD_CM: f64 = 50.0;

/// Malformed inbound payload
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Payload is not a JSON object")]
    NotAnObject,
    #[error("Payload has no string `sensor` field")]
    MissingSensor,
    #[error("Invalid {sensor} payload: {source}")]
    InvalidFields {
        sensor: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Classification thresholds in centimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub ultrasonic_cm: f64,
    pub tof_cm: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ultrasonic_cm: DEFAULT_ULTRASONIC_THRESHOLD_CM,
            tof_cm: DEFAULT_TOF_THRESHOLD_CM,
        }
    }
}

#[derive(Deserialize)]
struct RawDistance {
    distance: f64,
}

fn default_pattern() -> String {
    "none".to_string()
}

#[derive(Deserialize)]
struct RawVibrator {
    #[serde(default = "default_pattern")]
    pattern: String,
    #[serde(default)]
    intensity: f64,
    #[serde(default)]
    active: bool,
}

#[derive(Deserialize)]
struct RawGps {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    accuracy: f64,
}

#[derive(Deserialize)]
struct RawImu {
    #[serde(default)]
    acceleration: Vector3,
    #[serde(default)]
    gyroscope: Vector3,
    #[serde(default)]
    orientation: f64,
}

/// Stateless classifier, configured once with its thresholds
#[derive(Debug, Clone, Default)]
pub struct TelemetryClassifier {
    thresholds: Thresholds,
}

impl TelemetryClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Classify a raw frame, stamping it with the current time
    ///
    /// Returns `Ok(None)` for a well-formed frame from a sensor this client
    /// does not know about.
    pub fn classify(&self, payload: &str) -> Result<Option<TelemetryEvent>, ParseError> {
        self.classify_at(payload, Utc::now())
    }

    /// Classify a raw frame with an explicit capture time
    pub fn classify_at(
        &self,
        payload: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<TelemetryEvent>, ParseError> {
        let value: Value = serde_json::from_str(payload).map_err(ParseError::InvalidJson)?;
        self.classify_value(value, timestamp)
    }

    /// Classify an already decoded JSON value
    pub fn classify_value(
        &self,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<TelemetryEvent>, ParseError> {
        let object = value.as_object().ok_or(ParseError::NotAnObject)?;
        let sensor = object
            .get("sensor")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingSensor)?;

        let event = match SensorKind::parse(sensor) {
            SensorKind::Ultrasonic => {
                let raw: RawDistance = decode("ultrasonic", value)?;
                TelemetryEvent::Ultrasonic(UltrasonicReading {
                    distance: raw.distance,
                    obstacle: raw.distance < self.thresholds.ultrasonic_cm,
                    timestamp,
                })
            }
            SensorKind::Tof => {
                let raw: RawDistance = decode("tof", value)?;
                TelemetryEvent::Tof(TofReading {
                    distance: raw.distance,
                    stair: raw.distance > self.thresholds.tof_cm,
                    timestamp,
                })
            }
            SensorKind::Vibrator => {
                let raw: RawVibrator = decode("vibrator", value)?;
                TelemetryEvent::Vibrator(VibratorState {
                    pattern: raw.pattern,
                    intensity: raw.intensity,
                    active: raw.active,
                    timestamp,
                })
            }
            SensorKind::Gps => {
                let raw: RawGps = decode("gps", value)?;
                TelemetryEvent::Gps(GpsFix {
                    latitude: raw.latitude,
                    longitude: raw.longitude,
                    accuracy: raw.accuracy,
                    timestamp,
                })
            }
            SensorKind::Imu => {
                let raw: RawImu = decode("imu", value)?;
                TelemetryEvent::Imu(ImuReading {
                    acceleration: raw.acceleration,
                    gyroscope: raw.gyroscope,
                    orientation: raw.orientation,
                    timestamp,
                })
            }
            SensorKind::Unknown(other) => {
                debug!(sensor = %other, "Discarding frame from unrecognized sensor");
                return Ok(None);
            }
        };

        Ok(Some(event))
    }
}

fn decode<T: for<'de> Deserialize<'de>>(sensor: &'static str, value: Value) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|source| ParseError::InvalidFields { sensor, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn classify(payload: &str) -> Option<TelemetryEvent> {
        TelemetryClassifier::default()
            .classify_at(payload, fixed_time())
            .unwrap()
    }

    #[test]
    fn test_ultrasonic_obstacle_flag() {
        match classify(r#"{"sensor":"ultrasonic","distance":40}"#) {
            Some(TelemetryEvent::Ultrasonic(reading)) => {
                assert_eq!(reading.distance, 40.0);
                assert!(reading.obstacle);
                assert_eq!(reading.timestamp, fixed_time());
            }
            other => panic!("Expected ultrasonic reading, got {other:?}"),
        }

        match classify(r#"{"sensor":"ultrasonic","distance":150}"#) {
            Some(TelemetryEvent::Ultrasonic(reading)) => assert!(!reading.obstacle),
            other => panic!("Expected ultrasonic reading, got {other:?}"),
        }
    }

    #[test]
    fn test_ultrasonic_at_threshold_is_clear() {
        match classify(r#"{"sensor":"ultrasonic","distance":100}"#) {
            Some(TelemetryEvent::Ultrasonic(reading)) => assert!(!reading.obstacle),
            other => panic!("Expected ultrasonic reading, got {other:?}"),
        }
    }

    #[test]
    fn test_tof_stair_flag() {
        match classify(r#"{"sensor":"tof","distance":80}"#) {
            Some(TelemetryEvent::Tof(reading)) => assert!(reading.stair),
            other => panic!("Expected tof reading, got {other:?}"),
        }

        match classify(r#"{"sensor":"tof","distance":30}"#) {
            Some(TelemetryEvent::Tof(reading)) => assert!(!reading.stair),
            other => panic!("Expected tof reading, got {other:?}"),
        }

        match classify(r#"{"sensor":"tof","distance":50}"#) {
            Some(TelemetryEvent::Tof(reading)) => assert!(!reading.stair),
            other => panic!("Expected tof reading, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = TelemetryClassifier::new(Thresholds {
            ultrasonic_cm: 30.0,
            tof_cm: 90.0,
        });

        let event = classifier
            .classify(r#"{"sensor":"ultrasonic","distance":40}"#)
            .unwrap();
        assert!(matches!(
            event,
            Some(TelemetryEvent::Ultrasonic(UltrasonicReading { obstacle: false, .. }))
        ));

        let event = classifier
            .classify(r#"{"sensor":"tof","distance":80}"#)
            .unwrap();
        assert!(matches!(
            event,
            Some(TelemetryEvent::Tof(TofReading { stair: false, .. }))
        ));
    }

    #[test]
    fn test_vibrator_passthrough() {
        match classify(r#"{"sensor":"vibrator","pattern":"alert","intensity":75,"active":true}"#) {
            Some(TelemetryEvent::Vibrator(state)) => {
                assert_eq!(state.pattern, "alert");
                assert_eq!(state.intensity, 75.0);
                assert!(state.active);
            }
            other => panic!("Expected vibrator state, got {other:?}"),
        }
    }

    #[test]
    fn test_vibrator_defaults() {
        match classify(r#"{"sensor":"vibrator"}"#) {
            Some(TelemetryEvent::Vibrator(state)) => {
                assert_eq!(state.pattern, "none");
                assert_eq!(state.intensity, 0.0);
                assert!(!state.active);
            }
            other => panic!("Expected vibrator state, got {other:?}"),
        }
    }

    #[test]
    fn test_gps_passthrough() {
        match classify(
            r#"{"sensor":"gps","latitude":51.5074,"longitude":-0.1278,"accuracy":4.5}"#,
        ) {
            Some(TelemetryEvent::Gps(fix)) => {
                assert_eq!(fix.latitude, 51.5074);
                assert_eq!(fix.longitude, -0.1278);
                assert_eq!(fix.accuracy, 4.5);
            }
            other => panic!("Expected gps fix, got {other:?}"),
        }
    }

    #[test]
    fn test_imu_passthrough_with_partial_vectors() {
        let payload = r#"{
            "sensor": "imu",
            "acceleration": {"x": 0.1, "y": -0.2, "z": 9.8},
            "gyroscope": {"z": 1.5},
            "orientation": 270
        }"#;

        match classify(payload) {
            Some(TelemetryEvent::Imu(reading)) => {
                assert_eq!(
                    reading.acceleration,
                    Vector3 {
                        x: 0.1,
                        y: -0.2,
                        z: 9.8
                    }
                );
                assert_eq!(
                    reading.gyroscope,
                    Vector3 {
                        x: 0.0,
                        y: 0.0,
                        z: 1.5
                    }
                );
                assert_eq!(reading.orientation, 270.0);
            }
            other => panic!("Expected imu reading, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_sensor_is_discarded() {
        assert!(classify(r#"{"sensor":"unknown_thing","foo":1}"#).is_none());
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let event = classify(r#"{"sensor":"tof","distance":12,"firmware":"1.2.0"}"#);
        assert!(matches!(event, Some(TelemetryEvent::Tof(_))));
    }

    #[test]
    fn test_parse_errors() {
        let classifier = TelemetryClassifier::default();

        assert!(matches!(
            classifier.classify("not json"),
            Err(ParseError::InvalidJson(_))
        ));
        assert!(matches!(
            classifier.classify("[1, 2, 3]"),
            Err(ParseError::NotAnObject)
        ));
        assert!(matches!(
            classifier.classify(r#"{"distance": 10}"#),
            Err(ParseError::MissingSensor)
        ));
        assert!(matches!(
            classifier.classify(r#"{"sensor": 7}"#),
            Err(ParseError::MissingSensor)
        ));
        assert!(matches!(
            classifier.classify(r#"{"sensor":"ultrasonic"}"#),
            Err(ParseError::InvalidFields {
                sensor: "ultrasonic",
                ..
            })
        ));
        assert!(matches!(
            classifier.classify(r#"{"sensor":"tof","distance":"far"}"#),
            Err(ParseError::InvalidFields { sensor: "tof", .. })
        ));
    }

    #[test]
    fn test_classify_assigns_current_time() {
        let before = Utc::now();
        let event = TelemetryClassifier::default()
            .classify(r#"{"sensor":"gps"}"#)
            .unwrap()
            .unwrap();
        let after = Utc::now();

        assert!(event.timestamp() >= before);
        assert!(event.timestamp() <= after);
    }
}
