//! Unified error handling for ibfan
//!
//! A single error type shared by the core library and the daemon binary.
//! Variants are grouped by how callers are expected to react: transport and
//! mode-sequencing failures are recovered locally, resolution failures abort
//! startup.

use std::io;
use std::path::PathBuf;

/// Result type alias using IbfanError
pub type Result<T> = std::result::Result<T, IbfanError>;

/// Unified error type for all ibfan operations
#[derive(thiserror::Error, Debug)]
pub enum IbfanError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Embedded Controller Errors
    // ============================================================================
    /// A register round trip failed (after retries, for writes). The state of
    /// the target register is unknown.
    #[error("EC transaction failed at 0x{addr:04x}: {reason}")]
    Transport {
        addr: u16,
        reason: String,
    },

    /// Every step of a mode handshake failed; the EC never saw the switch.
    #[error("EC mode switch failed: {failed} of {total} register operations failed")]
    ModeSwitch {
        failed: usize,
        total: usize,
    },

    #[error("Management interface call failed: {0}")]
    Channel(String),

    // ============================================================================
    // Sensor and Actuator Errors
    // ============================================================================
    #[error("Temperature source {path} unavailable: {reason}")]
    SensorUnavailable {
        path: PathBuf,
        reason: String,
    },

    #[error("No temperature sensor found (looked for {searched})")]
    NoSensor {
        searched: String,
    },

    #[error("No writable fan actuator found (looked for {searched})")]
    NoActuator {
        searched: String,
    },

    #[error("Failed to write fan target to {path}: {reason}")]
    ActuatorWrite {
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl IbfanError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a transport error for a register address
    pub fn transport(addr: u16, reason: impl Into<String>) -> Self {
        Self::Transport {
            addr,
            reason: reason.into(),
        }
    }

    /// Create a sensor-unavailable error for a node path
    pub fn sensor_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SensorUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that abort startup rather than being recovered in the loop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoSensor { .. }
                | Self::NoActuator { .. }
                | Self::ModeSwitch { .. }
                | Self::InvalidConfig { .. }
                | Self::JsonParse(_)
        )
    }
}

// Allow converting from String to IbfanError
impl From<String> for IbfanError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to IbfanError
impl From<&str> for IbfanError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_formats_address_as_hex() {
        let err = IbfanError::transport(0x0741, "WMI call rejected");
        assert_eq!(
            err.to_string(),
            "EC transaction failed at 0x0741: WMI call rejected"
        );
    }

    #[test]
    fn resolution_errors_are_fatal() {
        assert!(IbfanError::NoSensor { searched: "k10temp".into() }.is_fatal());
        assert!(IbfanError::NoActuator { searched: "pwm".into() }.is_fatal());
        assert!(IbfanError::ModeSwitch { failed: 4, total: 4 }.is_fatal());
    }

    #[test]
    fn loop_errors_are_recoverable() {
        assert!(!IbfanError::transport(0x1804, "busy").is_fatal());
        assert!(!IbfanError::sensor_unavailable("/sys/class/hwmon/hwmon3/temp1_input", "gone").is_fatal());
        assert!(!IbfanError::InvalidArgument("abc".into()).is_fatal());
    }

    #[test]
    fn string_conversion_is_generic() {
        let err: IbfanError = "boom".into();
        assert!(matches!(err, IbfanError::Generic(ref m) if m == "boom"));
    }
}
