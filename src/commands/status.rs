//! Device status report returned by `GET /status`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Typed view of the firmware's status report
///
/// Fields the firmware adds beyond the known ones are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    pub ip: String,
    /// Percent
    pub battery: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Seconds since boot
    pub uptime: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemStatus {
    pub fn is_low_battery(&self, threshold_percent: f64) -> bool {
        self.battery < threshold_percent
    }
}
