//! Serial transport: one open connection with line-buffered reads.
//!
//! A `Transport` owns a [`SerialPortAdapter`] and the bytes received but not
//! yet returned as a line. Ports opened from the OS are claimed in a
//! process-wide table, keyed by [`device_key`], so the same device node is
//! never opened twice by this process, even through different aliases.

use crate::error::{AtError, AtResult};
use crate::port::{device_key, PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Sleep between polls when the adapter reports an empty queue.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Read chunk size.
const READ_CHUNK: usize = 256;

static OPEN_PORTS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Claim on a device in the process-wide open table.
#[derive(Debug)]
struct PortClaim(String);

impl PortClaim {
    fn acquire(port: &str) -> Option<Self> {
        let key = device_key(port);
        OPEN_PORTS
            .lock()
            .insert(key.clone())
            .then(|| Self(key))
    }
}

impl Drop for PortClaim {
    fn drop(&mut self) {
        OPEN_PORTS.lock().remove(&self.0);
    }
}

/// An open serial connection to a modem.
#[derive(Debug)]
pub struct Transport {
    port: String,
    baud_rate: u32,
    adapter: Option<Box<dyn SerialPortAdapter>>,
    pending: Vec<u8>,
    claim: Option<PortClaim>,
}

impl Transport {
    /// Open the device at `port` and discard whatever is sitting in its
    /// input buffer.
    ///
    /// Fails with [`AtError::Connection`] if the OS refuses the port or this
    /// process already has it open.
    pub fn open(port: &str, baud_rate: u32) -> AtResult<Self> {
        Self::open_with(port, &PortConfiguration::with_baud(baud_rate))
    }

    /// [`open`](Self::open) with explicit line settings.
    pub fn open_with(port: &str, config: &PortConfiguration) -> AtResult<Self> {
        let baud_rate = config.baud_rate;
        let claim = PortClaim::acquire(port).ok_or_else(|| {
            AtError::connection(
                port,
                PortError::config("port is already open in this process"),
            )
        })?;

        let adapter =
            SyncSerialPort::open(port, config).map_err(|e| AtError::connection(port, e))?;

        let mut transport = Self {
            port: port.to_string(),
            baud_rate,
            adapter: Some(Box::new(adapter)),
            pending: Vec::new(),
            claim: Some(claim),
        };
        transport.clear_input()?;

        info!(
            port,
            baud_rate,
            rtscts = config.hardware_flow_control,
            "serial port opened"
        );
        Ok(transport)
    }

    /// Wrap an already-open adapter.
    ///
    /// Injected adapters are not entered in the open-port table; the caller
    /// owns their uniqueness.
    pub fn from_adapter(adapter: impl SerialPortAdapter + 'static, baud_rate: u32) -> Self {
        Self {
            port: adapter.name().to_string(),
            baud_rate,
            adapter: Some(Box::new(adapter)),
            pending: Vec::new(),
            claim: None,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn is_open(&self) -> bool {
        self.adapter.is_some()
    }

    fn adapter(&mut self) -> AtResult<&mut Box<dyn SerialPortAdapter>> {
        let port = &self.port;
        self.adapter
            .as_mut()
            .ok_or_else(|| AtError::connection(port.as_str(), PortError::Closed))
    }

    /// Write all of `data` and flush it to the device.
    ///
    /// A port that stops accepting bytes (flow control held off, wedged
    /// driver) yields [`AtError::Timeout`] once `timeout` elapses.
    pub fn write(&mut self, data: &[u8], timeout: Duration) -> AtResult<()> {
        let deadline = Instant::now() + timeout;
        let port = self.port.clone();
        let adapter = self.adapter()?;

        let mut written = 0;
        while written < data.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AtError::Timeout {
                    command: None,
                    timeout,
                    partial: String::new(),
                });
            }
            adapter
                .set_timeout(remaining)
                .map_err(|e| AtError::connection(&port, e))?;

            match adapter.write_bytes(&data[written..]) {
                Ok(0) => {
                    return Err(AtError::connection(
                        port,
                        PortError::Io(std::io::ErrorKind::WriteZero.into()),
                    ))
                }
                Ok(n) => written += n,
                Err(e) if e.is_idle() => {
                    trace!(port = %port, written, "port not accepting bytes");
                    std::thread::sleep(remaining.min(IDLE_POLL));
                }
                Err(e) => return Err(AtError::connection(port, e)),
            }
        }
        adapter.flush().map_err(|e| AtError::connection(&port, e))?;

        trace!(port = %port, bytes = written, "wrote");
        Ok(())
    }

    /// Return the next line, without its `\n` or `\r\n` ending.
    ///
    /// A line already buffered is returned even when `timeout` is zero.
    /// Otherwise reads until a newline arrives or `timeout` elapses, which
    /// yields [`AtError::Timeout`] with the unterminated bytes as `partial`.
    pub fn read_line(&mut self, timeout: Duration) -> AtResult<String> {
        let deadline = Instant::now() + timeout;
        let port = self.port.clone();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AtError::Timeout {
                    command: None,
                    timeout,
                    partial: String::from_utf8_lossy(&self.pending).into_owned(),
                });
            }

            let adapter = self.adapter()?;
            adapter
                .set_timeout(remaining)
                .map_err(|e| AtError::connection(&port, e))?;

            match adapter.read_bytes(&mut chunk) {
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.is_idle() => {
                    if matches!(&e, PortError::Io(io) if io.kind() == std::io::ErrorKind::WouldBlock)
                    {
                        std::thread::sleep(remaining.min(IDLE_POLL));
                    }
                }
                Err(e) => return Err(AtError::connection(&port, e)),
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let end = memchr::memchr(b'\n', &self.pending)?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Discard buffered bytes, both ours and the device's.
    pub fn clear_input(&mut self) -> AtResult<()> {
        self.pending.clear();
        let port = self.port.clone();
        self.adapter()?
            .clear_input()
            .map_err(|e| AtError::connection(port, e))
    }

    /// Release the port. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.adapter.take().is_some() {
            debug!(port = %self.port, "serial port closed");
        }
        self.pending.clear();
        self.claim = None;
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}
