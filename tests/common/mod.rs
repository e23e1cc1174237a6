//! Shared test utilities for the driver integration tests.
//!
//! Provides:
//! - Mock modems with scripted replies
//! - A port lock and a serial adapter that record what happened, in order

#![allow(dead_code)]

use parking_lot::Mutex;
use sim7600_at::error::AtResult;
use sim7600_at::port::{MockSerialPort, PortError, SerialPortAdapter};
use sim7600_at::{AtEngine, InProcessLock, PortLock, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Something observable a command cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquired,
    Write(Vec<u8>),
    Released,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A mock modem that answers every listed command with its reply.
///
/// # Example
/// ```ignore
/// let mock = scripted_modem("MOCK0", &[(b"AT\r\n", b"AT\r\nOK\r\n")]);
/// ```
pub fn scripted_modem(port_name: &str, script: &[(&[u8], &[u8])]) -> MockSerialPort {
    let mut mock = MockSerialPort::new(port_name);
    for (request, reply) in script {
        mock.always_reply_to(request, reply);
    }
    mock
}

/// An [`InProcessLock`] that counts and records acquire/release calls.
#[derive(Debug)]
pub struct RecordingLock {
    inner: InProcessLock,
    events: EventLog,
    pub acquires: AtomicUsize,
    pub releases: AtomicUsize,
}

impl RecordingLock {
    pub fn new(port: &str, events: EventLog) -> Arc<Self> {
        Arc::new(Self {
            inner: InProcessLock::new(port),
            events,
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    pub fn counts(&self) -> (usize, usize) {
        (
            self.acquires.load(Ordering::SeqCst),
            self.releases.load(Ordering::SeqCst),
        )
    }

    pub fn is_held(&self) -> bool {
        self.inner.is_held()
    }
}

impl PortLock for RecordingLock {
    fn acquire(&self) -> AtResult<()> {
        self.inner.acquire()?;
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(Event::Acquired);
        Ok(())
    }

    fn release(&self) -> AtResult<()> {
        // Recorded while still held so another thread's Acquired cannot
        // slip in ahead of it.
        self.events.lock().push(Event::Released);
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release()
    }

    fn port(&self) -> &str {
        self.inner.port()
    }
}

/// Wraps a [`MockSerialPort`] and records every write.
#[derive(Debug)]
pub struct RecordingPort {
    inner: MockSerialPort,
    events: EventLog,
}

impl RecordingPort {
    pub fn new(inner: MockSerialPort, events: EventLog) -> Self {
        Self { inner, events }
    }
}

impl SerialPortAdapter for RecordingPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.events.lock().push(Event::Write(data.to_vec()));
        self.inner.write_bytes(data)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.inner.read_bytes(buffer)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.inner.set_timeout(timeout)
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        self.inner.clear_input()
    }
}

/// An engine over `mock` with a counting lock.
pub fn counted_engine(mock: &MockSerialPort, timeout: Duration) -> (Arc<RecordingLock>, AtEngine) {
    let lock = RecordingLock::new(mock.name(), event_log());
    let transport = Transport::from_adapter(mock.clone(), 115_200);
    let engine = AtEngine::with_lock(transport, lock.clone()).with_default_timeout(timeout);
    (lock, engine)
}
