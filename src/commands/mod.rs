//! Command surface of the device
//!
//! Wire contract:
//!
//! | Command            | Request                         | Body                     |
//! |--------------------|---------------------------------|--------------------------|
//! | vibrate            | `POST /vibrate`                 | `{pattern, intensity}`   |
//! | vibrator pattern   | `POST /vibrator/pattern`        | `{pattern}`              |
//! | calibrate          | `POST /calibrate`               | `{}`                     |
//! | system status      | `GET /status`                   | -                        |
//! | probe              | `GET /`                         | -                        |

pub mod dispatcher;
pub mod status;

pub use dispatcher::{
    parse_body, CommandDispatcher, CommandError, CommandErrorKind, DEFAULT_COMMAND_TIMEOUT,
};
pub use status::SystemStatus;

pub const VIBRATE_PATH: &str = "/vibrate";
pub const VIBRATOR_PATTERN_PATH: &str = "/vibrator/pattern";
pub const CALIBRATE_PATH: &str = "/calibrate";
pub const STATUS_PATH: &str = "/status";
pub const ROOT_PATH: &str = "/";

/// Highest intensity the firmware accepts
pub const MAX_INTENSITY: u8 = 100;
