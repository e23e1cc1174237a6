//! Command/response engine.
//!
//! [`AtEngine::send`] runs one command cycle:
//!
//! ```text
//! IDLE -> LOCK_WAIT -> WRITING -> READING -> SUCCESS      -> LOCK_RELEASED
//!                                         -> DEVICE_ERROR -> LOCK_RELEASED
//!                                         -> TIMEOUT      -> LOCK_RELEASED
//! ```
//!
//! The port lock is held by a guard for the whole cycle, so it is released
//! on every exit, including write failures. `send` blocks the calling thread
//! until the cycle ends; there is no cancellation and no retry.

use crate::command::AtCommand;
use crate::config::Config;
use crate::error::{AtError, AtResult};
use crate::identity::DeviceIdentity;
use crate::lock::{LockRegistry, PortLock, PortLockGuard};
use crate::power::{self, NoPowerControl, PowerControl};
use crate::response::{classify, join_lines, LineKind, Response};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Per-command timeout when neither the command nor the engine sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the timeout of [`AtEngine::verify`] and
/// [`AtEngine::identify`].
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Issues AT commands on one serial port.
///
/// The engine is `Sync`: share it behind an `Arc` and call [`send`](Self::send)
/// from several threads; cycles are serialized by the port lock.
pub struct AtEngine {
    transport: Mutex<Transport>,
    lock: Arc<dyn PortLock>,
    power: Box<dyn PowerControl>,
    powered: AtomicBool,
    default_timeout: Duration,
}

impl AtEngine {
    /// Open `port` and lock through the process-wide registry.
    pub fn open(port: &str, baud_rate: u32) -> AtResult<Self> {
        let transport = Transport::open(port, baud_rate)?;
        Self::with_registry(transport, &LockRegistry::global())
    }

    /// Build an engine from configuration, taking locks from `registry`.
    pub fn from_config(config: &Config, registry: &LockRegistry) -> AtResult<Self> {
        let port = config.serial.resolve_port(&config.serial.port);
        let transport = Transport::open_with(&port, &config.serial.port_configuration())?;
        Ok(Self::with_registry(transport, registry)?
            .with_default_timeout(config.serial.timeout())
            .with_power_control(power::from_config(&config.power)))
    }

    /// Wrap `transport`, sharing the registry's lock for its port.
    pub fn with_registry(transport: Transport, registry: &LockRegistry) -> AtResult<Self> {
        let lock = registry.lock_for(transport.port())?;
        Ok(Self::with_lock(transport, lock))
    }

    /// Wrap `transport` with an explicit lock.
    pub fn with_lock(transport: Transport, lock: Arc<dyn PortLock>) -> Self {
        Self {
            transport: Mutex::new(transport),
            lock,
            power: Box::new(NoPowerControl),
            powered: AtomicBool::new(true),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Install a power control.
    ///
    /// A managed control puts the engine in the off state until
    /// [`power_on`](Self::power_on) succeeds.
    pub fn with_power_control(mut self, power: Box<dyn PowerControl>) -> Self {
        self.powered = AtomicBool::new(!power.is_managed());
        self.power = power;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn port(&self) -> &str {
        self.lock.port()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    /// Record a power state established outside the driver, e.g. a modem
    /// that was already running when this process started.
    pub fn assume_powered(&self, powered: bool) {
        self.powered.store(powered, Ordering::SeqCst);
    }

    /// Send a command and wait for its terminator.
    ///
    /// Returns every received line on success. An `ERROR`, `+CME ERROR` or
    /// `+CMS ERROR` line yields [`AtError::Device`]; no terminator within the
    /// timeout yields [`AtError::Timeout`] with the partial buffer.
    ///
    /// The timeout covers the write as well as the reply. Input left over
    /// from earlier cycles, such as a late reply to a command that timed
    /// out, is discarded before the command is written.
    pub fn send(&self, command: impl Into<AtCommand>) -> AtResult<Response> {
        let command = command.into();
        if !self.is_powered() {
            return Err(AtError::PoweredOff(self.port().to_string()));
        }
        let timeout = command.timeout_override().unwrap_or(self.default_timeout);

        trace!(port = self.port(), command = %command, "waiting for port lock");
        let _lock = PortLockGuard::acquire(self.lock.as_ref())?;
        let mut transport = self.transport.lock();

        let started = Instant::now();
        let deadline = started + timeout;
        transport.clear_input()?;
        debug!(port = self.port(), command = %command, ?timeout, "sending");
        if let Err(e) = transport.write(&command.to_line(), timeout) {
            return Err(match e {
                AtError::Timeout { .. } => {
                    warn!(port = self.port(), command = %command, "port did not accept the command");
                    AtError::Timeout {
                        command: Some(command.text().to_string()),
                        timeout,
                        partial: String::new(),
                    }
                }
                other => other,
            });
        }

        let mut buffer: Vec<String> = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match transport.read_line(remaining) {
                Ok(line) => line,
                Err(AtError::Timeout { partial, .. }) => {
                    if !partial.is_empty() {
                        buffer.push(partial);
                    }
                    warn!(
                        port = self.port(),
                        command = %command,
                        elapsed = ?started.elapsed(),
                        lines = buffer.len(),
                        "no terminator before timeout"
                    );
                    return Err(AtError::Timeout {
                        command: Some(command.text().to_string()),
                        timeout,
                        partial: join_lines(&buffer),
                    });
                }
                Err(e) => return Err(e),
            };

            trace!(port = self.port(), line = %line, "received");
            let kind = classify(&line, command.expected());
            buffer.push(line);

            match kind {
                LineKind::Data => continue,
                LineKind::Terminator => {
                    debug!(
                        port = self.port(),
                        command = %command,
                        elapsed = ?started.elapsed(),
                        "completed"
                    );
                    return Ok(Response::new(command.text(), buffer));
                }
                LineKind::Failure(failure) => {
                    debug!(port = self.port(), command = %command, %failure, "device error");
                    return Err(AtError::Device {
                        category: command.error_category(),
                        command: command.text().to_string(),
                        failure,
                        response: join_lines(&buffer),
                    });
                }
            }
        }
    }

    /// Whether the device answers a bare `AT` with `OK`.
    ///
    /// Device errors and timeouts mean "no"; connection and lock failures
    /// propagate.
    pub fn verify(&self) -> AtResult<bool> {
        match self.send(AtCommand::new("AT").timeout(self.probe_timeout())) {
            Ok(_) => Ok(true),
            Err(AtError::Device { .. } | AtError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Query `ATI` and parse the product identification.
    pub fn identify(&self) -> AtResult<DeviceIdentity> {
        let response = self.send(AtCommand::new("ATI").timeout(self.probe_timeout()))?;
        Ok(DeviceIdentity::parse(&response))
    }

    fn probe_timeout(&self) -> Duration {
        self.default_timeout.min(PROBE_TIMEOUT)
    }

    /// Run the power-on sequence and discard whatever the module printed
    /// while booting.
    pub fn power_on(&self) -> AtResult<()> {
        let _lock = PortLockGuard::acquire(self.lock.as_ref())?;
        self.power.power_on()?;
        self.transport.lock().clear_input()?;
        self.powered.store(true, Ordering::SeqCst);
        info!(port = self.port(), "modem powered on");
        Ok(())
    }

    /// Run the power-off sequence. Fails if the modem is already off.
    pub fn power_off(&self) -> AtResult<()> {
        let _lock = PortLockGuard::acquire(self.lock.as_ref())?;
        if !self.is_powered() {
            return Err(AtError::PoweredOff(self.port().to_string()));
        }
        self.power.power_off()?;
        if self.power.is_managed() {
            self.powered.store(false, Ordering::SeqCst);
        }
        info!(port = self.port(), "modem powered off");
        Ok(())
    }

    /// Close the underlying port. Safe to call more than once.
    pub fn close(&self) {
        let _lock = PortLockGuard::acquire(self.lock.as_ref()).ok();
        self.transport.lock().close();
    }
}

impl fmt::Debug for AtEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtEngine")
            .field("port", &self.port())
            .field("powered", &self.is_powered())
            .field("default_timeout", &self.default_timeout)
            .field("power", &self.power)
            .finish()
    }
}
