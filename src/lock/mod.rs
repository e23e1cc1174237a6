//! Port locks: mutual exclusion keyed by serial port path.
//!
//! Every command cycle on a port runs while holding that port's
//! [`PortLock`]. The default [`InProcessLock`] serializes threads of one
//! process; [`FileLock`] additionally excludes other processes through an
//! OS advisory lock. Engines get their lock from a [`LockRegistry`] so all
//! engines on a port share one instance.
//!
//! A deployment where several processes drive the same modem must configure
//! every one of them for file locks; a process using in-process locks is
//! not excluded by the others. This cannot be detected at runtime; it is an
//! operational requirement. A [`FileLock`] created before `fork()` stays
//! valid in both processes, since each acquisition opens its own descriptor.
//!
//! Neither implementation queues waiters in arrival order. Wake-up order is
//! whatever `parking_lot`'s condition variable (and, across processes, the
//! kernel's `flock`) provides.

pub mod file;
pub mod in_process;
pub mod registry;

pub use file::FileLock;
pub use in_process::InProcessLock;
pub use registry::{LockFactory, LockRegistry};

use crate::error::AtResult;
use std::fmt;
use tracing::warn;

/// A named exclusive lock for one serial port.
pub trait PortLock: Send + Sync + fmt::Debug {
    /// Block until this caller owns the port.
    fn acquire(&self) -> AtResult<()>;

    /// Give up ownership taken by a matching [`acquire`](Self::acquire).
    fn release(&self) -> AtResult<()>;

    /// The port identifier this lock guards.
    fn port(&self) -> &str;
}

/// Holds a [`PortLock`] and releases it when dropped.
///
/// Dropping is the only way out, so every exit path of a command cycle,
/// error returns included, releases the lock.
#[must_use = "the port is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PortLockGuard<'a> {
    lock: &'a dyn PortLock,
}

impl<'a> PortLockGuard<'a> {
    pub fn acquire(lock: &'a dyn PortLock) -> AtResult<Self> {
        lock.acquire()?;
        Ok(Self { lock })
    }
}

impl Drop for PortLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            warn!(port = self.lock.port(), error = %e, "failed to release port lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = InProcessLock::new("/dev/ttyUSB2");
        {
            let _guard = PortLockGuard::acquire(&lock).unwrap();
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn fails(lock: &dyn PortLock) -> AtResult<()> {
            let _guard = PortLockGuard::acquire(lock)?;
            Err(crate::error::AtError::configuration("boom"))
        }

        let lock = InProcessLock::new("/dev/ttyUSB2");
        assert!(fails(&lock).is_err());
        assert!(!lock.is_held());
    }
}
