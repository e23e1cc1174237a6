//! Core traits for serial port abstraction.
//!
//! Defines the `SerialPortAdapter` trait that allows both real serial ports
//! and mock implementations to sit under the same transport.

use super::error::PortError;
use std::time::Duration;

/// Default modem baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Configuration parameters for a modem serial port.
///
/// SIM7600 modules only speak 8N1, so framing is not configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// RTS/CTS flow control, for modems wired to a UART. Off for USB CDC
    /// ports.
    pub hardware_flow_control: bool,

    /// Initial read timeout; the transport adjusts it per read.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            hardware_flow_control: false,
            timeout: Duration::from_millis(100),
        }
    }
}

impl PortConfiguration {
    /// Default configuration at the given baud rate.
    pub fn with_baud(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }
}

/// Trait for serial port I/O operations.
///
/// Implemented by [`super::SyncSerialPort`] for hardware and
/// [`super::MockSerialPort`] for tests.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read. An empty port reports an
    /// idle error (see [`PortError::is_idle`]) rather than `Ok(0)`.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Flush pending output to the device.
    fn flush(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read/write timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard any unread bytes in the receive buffer.
    fn clear_input(&mut self) -> Result<(), PortError>;
}
