//! Mock serial port implementation for testing.
//!
//! `MockSerialPort` stands in for a modem: bytes can be queued for reading
//! directly, or scripted as replies that are released when a matching
//! command line is written.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// Scripted request -> reply pairs, consumed front to back.
    replies: VecDeque<(Vec<u8>, Vec<u8>)>,
    /// Replies used for every matching write, never consumed.
    standing_replies: Vec<(Vec<u8>, Vec<u8>)>,
    should_fail_write: bool,
    input_cleared: usize,
}

/// Mock serial port implementation for testing.
///
/// Clones share the same state, so a test can keep a handle to inspect the
/// write log after handing the port to a transport.
///
/// # Example
/// ```
/// use sim7600_at::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.reply_to(b"AT\r\n", b"AT\r\nOK\r\n");
///
/// port.write_bytes(b"AT\r\n").unwrap();
///
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"AT\r\nOK\r\n");
/// assert_eq!(port.get_write_log(), vec![b"AT\r\n".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Release `reply` into the read queue the next time `request` is written.
    ///
    /// Scripted replies are matched in the order they were added.
    pub fn reply_to(&mut self, request: &[u8], reply: &[u8]) {
        self.state
            .lock()
            .replies
            .push_back((request.to_vec(), reply.to_vec()));
    }

    /// Release `reply` every time `request` is written.
    pub fn always_reply_to(&mut self, request: &[u8], reply: &[u8]) {
        self.state
            .lock()
            .standing_replies
            .push((request.to_vec(), reply.to_vec()));
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Make the next write fail as if the device had been unplugged.
    pub fn fail_next_write(&mut self) {
        self.state.lock().should_fail_write = true;
    }

    /// Number of times the input buffer has been cleared.
    pub fn input_clear_count(&self) -> usize {
        self.state.lock().input_cleared
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_fail_write {
            state.should_fail_write = false;
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }

        state.write_log.push(data.to_vec());

        let front_matches = state
            .replies
            .front()
            .is_some_and(|(request, _)| request.as_slice() == data);
        let scripted = if front_matches {
            state.replies.pop_front().map(|(_, reply)| reply)
        } else {
            None
        };
        let reply = scripted.or_else(|| {
            state
                .standing_replies
                .iter()
                .find(|(request, _)| request.as_slice() == data)
                .map(|(_, reply)| reply.clone())
        });
        if let Some(reply) = reply {
            state.read_queue.extend(reply);
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), PortError> {
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.input_cleared += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
