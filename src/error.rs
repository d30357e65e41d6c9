//! Custom error types for the pump adaptor.
//!
//! This module defines the primary error type, `PumpError`, for the whole crate.
//! Using the `thiserror` crate, it provides a single place for everything that can
//! go wrong between a caller and the syringe pump, from a dead serial line to a reply
//! that does not match any known pattern.
//!
//! ## Error Hierarchy
//!
//! `PumpError` groups its variants into the three failure kinds a caller has to tell apart:
//!
//! - **Communication**: `Timeout`, `Serial`, `Io`, `NotConnected`. Nothing (or not enough)
//!   came back over the wire, or the port itself failed.
//! - **Device-reported**: `Device` for an error line sent by the pump and `Alarm` for an
//!   alarm prompt (a stalled motor). The pump understood the command but refused or failed it.
//! - **Protocol mismatch**: `UnexpectedPrompt`, `UnexpectedResponse`, `Parse`. The pump answered,
//!   but in a shape this adaptor does not know. The command set is only partially documented,
//!   so these carry the raw text for diagnosis.
//!
//! Two further variants never involve the wire at all: `InvalidInput` is raised by local
//! validation before anything is written, and `Config` covers settings loading. `Verification`
//! is raised when a setting was accepted but reading it back returned something else.
//!
//! None of these are retried internally. Re-sending a command such as `run` would repeat a
//! physical action.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type PumpResult<T> = std::result::Result<T, PumpError>;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum PumpError {
    #[error("Configuration load error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Serial port not connected")]
    NotConnected,

    #[error("No response from pump within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Pump reported an error for '{command}': {message}")]
    Device { command: String, message: String },

    #[error("Pump alarm after '{command}': {alarm}")]
    Alarm { command: String, alarm: String },

    #[error("Unexpected prompt '{prompt}' ({rest})")]
    UnexpectedPrompt { prompt: String, rest: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Failed to parse {what} from '{raw}'")]
    Parse { what: &'static str, raw: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Setting not applied: requested {requested}, pump reports {actual}")]
    Verification { requested: String, actual: String },

    #[error("Pump is not running")]
    NotRunning,
}

impl PumpError {
    /// Shorthand for a [`PumpError::Parse`] error.
    pub fn parse(what: &'static str, raw: impl Into<String>) -> Self {
        PumpError::Parse {
            what,
            raw: raw.into(),
        }
    }

    /// True for failures where nothing usable came back over the wire.
    pub fn is_communication(&self) -> bool {
        match self {
            PumpError::Timeout(_) | PumpError::Io(_) | PumpError::NotConnected => true,
            #[cfg(feature = "instrument_serial")]
            PumpError::Serial(_) => true,
            _ => false,
        }
    }

    /// True when the pump itself reported the failure.
    pub fn is_device_reported(&self) -> bool {
        matches!(self, PumpError::Device { .. } | PumpError::Alarm { .. })
    }

    /// True when the reply did not match any known pattern.
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(
            self,
            PumpError::UnexpectedPrompt { .. }
                | PumpError::UnexpectedResponse(_)
                | PumpError::Parse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = PumpError::Device {
            command: "irate 0 ul/min".to_string(),
            message: "Argument error: 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Pump reported an error for 'irate 0 ul/min': Argument error: 0"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert!(PumpError::Timeout(Duration::from_secs(1)).is_communication());
        assert!(PumpError::Alarm {
            command: "run".into(),
            alarm: "stalled".into()
        }
        .is_device_reported());
        assert!(PumpError::parse("force", "abc").is_protocol_mismatch());
        assert!(!PumpError::InvalidInput("force 0".into()).is_protocol_mismatch());
    }
}
