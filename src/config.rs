//! Client configuration
//!
//! A sectioned TOML file in which every section and every field is optional:
//!
//! ```toml
//! [device]
//! host = "192.168.1.100"
//! command_port = 80
//! stream_port = 81
//! connect_timeout_ms = 5000
//!
//! [telemetry]
//! ultrasonic_threshold_cm = 100.0
//! tof_threshold_cm = 50.0
//!
//! [reconnect]
//! base_delay_ms = 3000
//! max_attempts = 5
//!
//! [commands]
//! timeout_ms = 5000
//! ```

use crate::telemetry::{Thresholds, DEFAULT_TOF_THRESHOLD_CM, DEFAULT_ULTRASONIC_THRESHOLD_CM};
use crate::transport::{
    Endpoint, ReconnectConfig, ReconnectPolicy, DEFAULT_COMMAND_PORT, DEFAULT_HOST,
    DEFAULT_STREAM_PORT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Locations searched when no config path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["navistick.toml", "config/navistick.toml"];

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub commands: CommandsSection,
}

/// Where the device lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_command_port")]
    pub command_port: u16,
    #[serde(default = "default_stream_port")]
    pub stream_port: u16,
    /// WebSocket handshake timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_command_port() -> u16 {
    DEFAULT_COMMAND_PORT
}

fn default_stream_port() -> u16 {
    DEFAULT_STREAM_PORT
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            command_port: default_command_port(),
            stream_port: default_stream_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Classification thresholds in centimetres
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    #[serde(default = "default_ultrasonic_threshold")]
    pub ultrasonic_threshold_cm: f64,
    #[serde(default = "default_tof_threshold")]
    pub tof_threshold_cm: f64,
}

fn default_ultrasonic_threshold() -> f64 {
    DEFAULT_ULTRASONIC_THRESHOLD_CM
}

fn default_tof_threshold() -> f64 {
    DEFAULT_TOF_THRESHOLD_CM
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            ultrasonic_threshold_cm: default_ultrasonic_threshold(),
            tof_threshold_cm: default_tof_threshold(),
        }
    }
}

/// Linear backoff settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandsSection {
    #[serde(default = "default_command_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_command_timeout_ms() -> u64 {
    5000
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_command_timeout_ms(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// First existing file among [`DEFAULT_CONFIG_PATHS`]
    pub fn find_default_file() -> Option<PathBuf> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::InvalidConfig(message.to_string()));

        if self.device.host.trim().is_empty() {
            return invalid("device.host must not be empty");
        }
        self.endpoint()
            .stream_url()
            .map_err(|e| ConfigError::InvalidConfig(format!("device.host: {e}")))?;
        if self.device.command_port == 0 || self.device.stream_port == 0 {
            return invalid("device ports must be non-zero");
        }
        if self.device.connect_timeout_ms == 0 {
            return invalid("device.connect_timeout_ms must be greater than 0");
        }
        if !self.telemetry.ultrasonic_threshold_cm.is_finite()
            || !self.telemetry.tof_threshold_cm.is_finite()
        {
            return invalid("telemetry thresholds must be finite numbers");
        }
        ReconnectPolicy::validate_config(&self.reconnect_config())
            .map_err(|e| ConfigError::InvalidConfig(format!("reconnect.{e}")))?;
        if self.commands.timeout_ms == 0 {
            return invalid("commands.timeout_ms must be greater than 0");
        }

        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.device.host.clone())
            .with_command_port(self.device.command_port)
            .with_stream_port(self.device.stream_port)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            ultrasonic_cm: self.telemetry.ultrasonic_threshold_cm,
            tof_cm: self.telemetry.tof_threshold_cm,
        }
    }

    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.commands.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.device.connect_timeout_ms)
    }
}
