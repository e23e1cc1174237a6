//! Crate-level error taxonomy.
//!
//! Every engine operation returns [`AtResult`]. Device failures are a single
//! variant tagged with an [`ErrorCategory`] so callers can branch on the
//! command family without a type hierarchy.

use crate::port::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for modem operations.
pub type AtResult<T> = Result<T, AtError>;

/// Command family a device failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    #[default]
    General,
    V25ter,
    CallControl,
    Network,
    StatusControl,
    Phonebook,
    SimToolkit,
    Gprs,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::General => "general",
            Self::V25ter => "V.25ter",
            Self::CallControl => "call control",
            Self::Network => "network",
            Self::StatusControl => "status control",
            Self::Phonebook => "phonebook",
            Self::SimToolkit => "SIM application toolkit",
            Self::Gprs => "GPRS",
        };
        f.write_str(name)
    }
}

/// The error terminator a device answered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeviceFailure {
    /// Plain `ERROR`.
    Error,
    /// `+CME ERROR: <x>`, mobile equipment error.
    Cme(String),
    /// `+CMS ERROR: <x>`, message service error.
    Cms(String),
}

impl DeviceFailure {
    /// Numeric CME/CMS code, when the modem runs in numeric `AT+CMEE=1` mode.
    ///
    /// Verbose mode (`AT+CMEE=2`) reports text and yields `None`.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Error => None,
            Self::Cme(detail) | Self::Cms(detail) => detail.parse().ok(),
        }
    }
}

impl fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("ERROR"),
            Self::Cme(detail) => write!(f, "+CME ERROR: {detail}"),
            Self::Cms(detail) => write!(f, "+CMS ERROR: {detail}"),
        }
    }
}

/// Errors raised by the transport, lock and engine.
#[derive(Debug, Error)]
pub enum AtError {
    /// The port could not be opened, or failed while in use.
    #[error("connection to {port} failed: {source}")]
    Connection {
        port: String,
        #[source]
        source: PortError,
    },

    /// No terminator arrived within the allotted time.
    ///
    /// `partial` holds whatever was received, for diagnostics.
    #[error("{} timed out after {timeout:?}", .command.as_deref().unwrap_or("read"))]
    Timeout {
        command: Option<String>,
        timeout: Duration,
        partial: String,
    },

    /// The device answered with an error terminator.
    #[error("{category} command `{command}` failed: {failure}")]
    Device {
        category: ErrorCategory,
        command: String,
        failure: DeviceFailure,
        /// Every line received, the error line included.
        response: String,
    },

    /// Lock substitution after use, or an unusable lock configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The OS lock backing a cross-process port lock failed.
    #[error("port lock for {port} failed: {source}")]
    Lock {
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// A command was issued while the modem is powered down.
    #[error("device on {0} is not powered on")]
    PoweredOff(String),

    /// The power-key sequence failed.
    #[error("power control failed: {0}")]
    Power(#[source] std::io::Error),
}

impl AtError {
    /// Wrap a port error for the given port.
    pub fn connection(port: impl Into<String>, source: PortError) -> Self {
        Self::Connection {
            port: port.into(),
            source,
        }
    }

    /// Create a configuration error from a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Category of a device failure, `None` for every other error.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Device { category, .. } => Some(*category),
            _ => None,
        }
    }

    /// Received text attached to a device failure or timeout.
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Device { response, .. } => Some(response),
            Self::Timeout { partial, .. } => Some(partial),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display() {
        let err = AtError::Device {
            category: ErrorCategory::CallControl,
            command: "ATD+15550100;".to_string(),
            failure: DeviceFailure::Cme("30".to_string()),
            response: "+CME ERROR: 30".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "call control command `ATD+15550100;` failed: +CME ERROR: 30"
        );
        assert_eq!(err.category(), Some(ErrorCategory::CallControl));
        assert_eq!(err.response(), Some("+CME ERROR: 30"));
    }

    #[test]
    fn test_timeout_display() {
        let err = AtError::Timeout {
            command: Some("AT+COPS=?".to_string()),
            timeout: Duration::from_millis(500),
            partial: String::new(),
        };
        assert_eq!(err.to_string(), "AT+COPS=? timed out after 500ms");
        assert!(err.is_timeout());

        let err = AtError::Timeout {
            command: None,
            timeout: Duration::from_secs(1),
            partial: String::new(),
        };
        assert_eq!(err.to_string(), "read timed out after 1s");
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(DeviceFailure::Cme("10".into()).code(), Some(10));
        assert_eq!(DeviceFailure::Cms("500".into()).code(), Some(500));
        assert_eq!(DeviceFailure::Cme("SIM not inserted".into()).code(), None);
        assert_eq!(DeviceFailure::Error.code(), None);
    }

    #[test]
    fn test_connection_error_source() {
        let err = AtError::connection("/dev/ttyUSB2", PortError::not_found("/dev/ttyUSB2"));
        assert_eq!(
            err.to_string(),
            "connection to /dev/ttyUSB2 failed: Serial port not found: /dev/ttyUSB2"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.category(), None);
    }
}
