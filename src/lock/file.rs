//! Cross-process port lock backed by `flock(2)` on a lock file.

use super::PortLock;
use crate::error::{AtError, AtResult};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, trace};

/// The descriptor holding the OS lock, and the process that took it.
struct Holder {
    pid: u32,
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

/// Port lock that excludes other processes as well as other threads.
///
/// Every acquisition opens the lock file afresh. `flock` ownership belongs
/// to the open file description, so a descriptor opened before `fork()`
/// would be one owner shared by parent and child; a fresh open per
/// acquisition keeps them apart. A holder inherited from the parent is
/// recognised by its pid and discarded without unlocking.
pub struct FileLock {
    port: String,
    path: PathBuf,
    holder: Mutex<Option<Holder>>,
    released: Condvar,
}

impl FileLock {
    /// Prepare the lock file for `port` inside `lock_dir`.
    ///
    /// The file is named `LCK..<device>` after the last path component of
    /// the port, following the UUCP convention. It is created here so a bad
    /// directory fails early.
    pub fn new(port: &str, lock_dir: &Path) -> AtResult<Self> {
        if !cfg!(unix) {
            return Err(AtError::configuration(
                "cross-process port locks require a unix host",
            ));
        }

        let path = lock_dir.join(lock_file_name(port));
        open_lock_file(port, &path)?;

        debug!(port, path = %path.display(), "file port lock ready");
        Ok(Self {
            port: port.to_string(),
            path,
            holder: Mutex::new(None),
            released: Condvar::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a thread of this process owns the lock.
    pub fn is_held(&self) -> bool {
        self.holder
            .lock()
            .as_ref()
            .is_some_and(|holder| holder.pid == process::id())
    }

    #[cfg(unix)]
    fn flock(&self, file: &File, operation: libc::c_int) -> AtResult<()> {
        use std::os::unix::io::AsRawFd;

        loop {
            // SAFETY: the descriptor is owned by `file` and stays open for
            // the duration of the call.
            let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
            if rc == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(AtError::Lock {
                    port: self.port.clone(),
                    source: err,
                });
            }
        }
    }

    #[cfg(unix)]
    fn lock_os(&self, file: &File) -> AtResult<()> {
        self.flock(file, libc::LOCK_EX)
    }

    #[cfg(unix)]
    fn unlock_os(&self, file: &File) -> AtResult<()> {
        self.flock(file, libc::LOCK_UN)
    }

    #[cfg(not(unix))]
    fn lock_os(&self, _file: &File) -> AtResult<()> {
        Ok(())
    }

    #[cfg(not(unix))]
    fn unlock_os(&self, _file: &File) -> AtResult<()> {
        Ok(())
    }
}

impl PortLock for FileLock {
    /// Threads of this process queue on the condition variable; the one
    /// that gets through keeps the mutex while it blocks in `flock`, so
    /// at most one of them waits on the OS lock.
    fn acquire(&self) -> AtResult<()> {
        let pid = process::id();
        let mut holder = self.holder.lock();
        loop {
            match holder.as_ref() {
                Some(current) if current.pid == pid => self.released.wait(&mut holder),
                Some(current) => {
                    debug!(port = %self.port, owner = current.pid, "discarding lock inherited across fork");
                    // Closing our copy leaves the parent's lock in place.
                    *holder = None;
                }
                None => break,
            }
        }

        let file = open_lock_file(&self.port, &self.path)?;
        self.lock_os(&file)?;
        *holder = Some(Holder { pid, file });
        trace!(port = %self.port, "file port lock acquired");
        Ok(())
    }

    fn release(&self) -> AtResult<()> {
        let mut holder = self.holder.lock();
        let current = match holder.take() {
            Some(current) if current.pid == process::id() => current,
            other => {
                *holder = other;
                return Err(AtError::configuration(format!(
                    "release of {} without a matching acquire",
                    self.port
                )));
            }
        };
        let unlocked = self.unlock_os(&current.file);
        drop(current);
        drop(holder);
        self.released.notify_one();
        trace!(port = %self.port, "file port lock released");
        unlocked
    }

    fn port(&self) -> &str {
        &self.port
    }
}

impl fmt::Debug for FileLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLock")
            .field("port", &self.port)
            .field("path", &self.path)
            .finish()
    }
}

fn open_lock_file(port: &str, path: &Path) -> AtResult<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| AtError::Lock {
            port: port.to_string(),
            source,
        })
}

fn lock_file_name(port: &str) -> String {
    let device = port
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or("port");
    format!("LCK..{device}")
}
