//! Port-specific error types.
//!
//! Errors raised by the serial adapter layer. The transport folds these into
//! [`crate::error::AtError::Connection`] before they reach engine callers.

use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The OS refused access to the device node.
    #[error("Permission denied opening {0}")]
    PermissionDenied(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attempted to use a port that has been closed.
    #[error("Port is closed")]
    Closed,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error only means "nothing arrived yet".
    ///
    /// Real ports report an expired read timeout as `TimedOut`, the mock port
    /// reports an empty queue as `WouldBlock`.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            )
        )
    }

    /// Map a `serialport` open failure onto the port taxonomy.
    pub(crate) fn from_open(port_name: &str, e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => Self::not_found(port_name),
            serialport::ErrorKind::InvalidInput => Self::config(e.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => Self::not_found(port_name),
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                Self::PermissionDenied(port_name.to_string())
            }
            _ => Self::Serial(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB2");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB2");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        assert_eq!(PortError::Closed.to_string(), "Port is closed");
    }

    #[test]
    fn test_idle_classification() {
        assert!(PortError::Io(std::io::ErrorKind::WouldBlock.into()).is_idle());
        assert!(PortError::Io(std::io::ErrorKind::TimedOut.into()).is_idle());
        assert!(!PortError::Io(std::io::ErrorKind::BrokenPipe.into()).is_idle());
        assert!(!PortError::Closed.is_idle());
    }

    #[test]
    fn test_open_error_mapping() {
        let e = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            PortError::from_open("/dev/ttyUSB9", e),
            PortError::NotFound(name) if name == "/dev/ttyUSB9"
        ));

        let e = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "EACCES",
        );
        assert!(matches!(
            PortError::from_open("/dev/ttyUSB2", e),
            PortError::PermissionDenied(_)
        ));
    }
}
