//! Thread-level port lock.

use super::PortLock;
use crate::error::{AtError, AtResult};
use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// Port lock shared by the threads of one process.
///
/// Unlike a mutex guard, ownership is not tied to a stack frame: `release`
/// may be called from any thread, which is what the acquire/release split
/// of [`PortLock`] needs.
#[derive(Debug)]
pub struct InProcessLock {
    port: String,
    held: Mutex<bool>,
    available: Condvar,
}

impl InProcessLock {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            held: Mutex::new(false),
            available: Condvar::new(),
        }
    }

    /// Whether some caller currently owns the port.
    pub fn is_held(&self) -> bool {
        *self.held.lock()
    }
}

impl PortLock for InProcessLock {
    fn acquire(&self) -> AtResult<()> {
        let mut held = self.held.lock();
        while *held {
            self.available.wait(&mut held);
        }
        *held = true;
        trace!(port = %self.port, "port lock acquired");
        Ok(())
    }

    fn release(&self) -> AtResult<()> {
        let mut held = self.held.lock();
        if !*held {
            return Err(AtError::configuration(format!(
                "release of {} without a matching acquire",
                self.port
            )));
        }
        *held = false;
        drop(held);
        self.available.notify_one();
        trace!(port = %self.port, "port lock released");
        Ok(())
    }

    fn port(&self) -> &str {
        &self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_release() {
        let lock = InProcessLock::new("/dev/ttyUSB2");
        lock.acquire().unwrap();
        assert!(lock.is_held());
        lock.release().unwrap();
        assert!(!lock.is_held());
    }

    #[test]
    fn test_unmatched_release_is_rejected() {
        let lock = InProcessLock::new("/dev/ttyUSB2");
        assert!(matches!(lock.release(), Err(AtError::Configuration(_))));
    }

    #[test]
    fn test_excludes_other_threads() {
        let lock = Arc::new(InProcessLock::new("/dev/ttyUSB2"));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..10 {
                        lock.acquire().unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        lock.release().unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_from_another_thread_wakes_waiter() {
        let lock = Arc::new(InProcessLock::new("/dev/ttyUSB2"));
        lock.acquire().unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.acquire().unwrap();
                lock.release().unwrap();
            })
        };

        thread::sleep(Duration::from_millis(20));
        let releaser = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.release().unwrap())
        };

        releaser.join().unwrap();
        waiter.join().unwrap();
        assert!(!lock.is_held());
    }
}
