//! Process-scoped registry mapping port identifiers to their locks.

use super::{FileLock, InProcessLock, PortLock};
use crate::config::{LockConfig, LockMode};
use crate::error::{AtError, AtResult};
use crate::port::device_key;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds the lock for a port the first time it is requested.
pub type LockFactory = Arc<dyn Fn(&str) -> AtResult<Arc<dyn PortLock>> + Send + Sync>;

static GLOBAL: Lazy<Arc<LockRegistry>> = Lazy::new(|| Arc::new(LockRegistry::new()));

#[derive(Default)]
struct RegistryState {
    locks: HashMap<String, Arc<dyn PortLock>>,
    factory: Option<LockFactory>,
}

/// Hands out one shared [`PortLock`] per device.
///
/// Ports are keyed by [`device_key`], so a `/dev/serial/by-id/...` alias and
/// the node it points to share a lock. Factories receive the resolved key.
///
/// Locks are created lazily by the registry's factory. The factory may only
/// be replaced before any lock exists, and a port's lock may only be
/// installed before one exists for it; later substitution is an
/// [`AtError::Configuration`].
pub struct LockRegistry {
    state: Mutex<RegistryState>,
}

impl LockRegistry {
    /// A registry that creates [`InProcessLock`]s.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// A registry that creates locks with `factory`.
    pub fn with_factory(factory: LockFactory) -> Self {
        let registry = Self::new();
        registry.state.lock().factory = Some(factory);
        registry
    }

    /// A registry that creates [`FileLock`]s under `lock_dir`.
    pub fn file_locks(lock_dir: impl Into<PathBuf>) -> Self {
        let lock_dir = lock_dir.into();
        Self::with_factory(Arc::new(move |port: &str| -> AtResult<Arc<dyn PortLock>> {
            let lock: Arc<dyn PortLock> = Arc::new(FileLock::new(port, &lock_dir)?);
            Ok(lock)
        }))
    }

    /// Build a registry from the `[lock]` configuration section.
    pub fn from_config(config: &LockConfig) -> Self {
        match config.mode {
            LockMode::InProcess => Self::new(),
            LockMode::File => Self::file_locks(config.lock_dir.clone()),
        }
    }

    /// The lazily created process-wide registry.
    pub fn global() -> Arc<LockRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Replace the factory used for ports that have no lock yet.
    ///
    /// Fails once any lock has been registered, since engines holding the
    /// old locks would no longer exclude engines using new ones.
    pub fn set_factory(&self, factory: LockFactory) -> AtResult<()> {
        let mut state = self.state.lock();
        if !state.locks.is_empty() {
            return Err(AtError::configuration(
                "lock factory replaced after port locks were registered",
            ));
        }
        state.factory = Some(factory);
        info!("port lock factory replaced");
        Ok(())
    }

    /// Install a specific lock for `port`, e.g. one shared with a parent
    /// process.
    pub fn install(&self, port: &str, lock: Arc<dyn PortLock>) -> AtResult<()> {
        let key = device_key(port);
        let mut state = self.state.lock();
        if state.locks.contains_key(&key) {
            return Err(AtError::configuration(format!(
                "lock for {key} is already registered"
            )));
        }
        debug!(port = %key, "port lock installed");
        state.locks.insert(key, lock);
        Ok(())
    }

    /// The lock for `port`, created on first request.
    pub fn lock_for(&self, port: &str) -> AtResult<Arc<dyn PortLock>> {
        let key = device_key(port);
        let mut state = self.state.lock();
        if let Some(lock) = state.locks.get(&key) {
            return Ok(Arc::clone(lock));
        }

        let lock = match &state.factory {
            Some(factory) => factory(&key)?,
            None => Arc::new(InProcessLock::new(key.as_str())) as Arc<dyn PortLock>,
        };
        debug!(port = %key, "port lock created");
        state.locks.insert(key, Arc::clone(&lock));
        Ok(lock)
    }

    /// Number of ports with a lock.
    pub fn len(&self) -> usize {
        self.state.lock().locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LockRegistry")
            .field("ports", &state.locks.keys().collect::<Vec<_>>())
            .field("custom_factory", &state.factory.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_port_same_instance() {
        let registry = LockRegistry::new();
        let a = registry.lock_for("/dev/ttyUSB2").unwrap();
        let b = registry.lock_for("/dev/ttyUSB2").unwrap();
        let c = registry.lock_for("/dev/ttyUSB3").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_factory_used_lazily() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let registry = LockRegistry::with_factory(Arc::new(move |port: &str| -> AtResult<Arc<dyn PortLock>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(InProcessLock::new(port)) as Arc<dyn PortLock>)
        }));

        assert_eq!(built.load(Ordering::SeqCst), 0);
        registry.lock_for("/dev/ttyUSB2").unwrap();
        registry.lock_for("/dev/ttyUSB2").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_factory_after_use_is_rejected() {
        let registry = LockRegistry::new();
        registry
            .set_factory(Arc::new(|port: &str| -> AtResult<Arc<dyn PortLock>> {
                Ok(Arc::new(InProcessLock::new(port)) as Arc<dyn PortLock>)
            }))
            .unwrap();

        registry.lock_for("/dev/ttyUSB2").unwrap();
        let err = registry
            .set_factory(Arc::new(|port: &str| -> AtResult<Arc<dyn PortLock>> {
                Ok(Arc::new(InProcessLock::new(port)) as Arc<dyn PortLock>)
            }))
            .unwrap_err();
        assert!(matches!(err, AtError::Configuration(_)));
    }

    #[test]
    fn test_install_before_and_after_use() {
        let registry = LockRegistry::new();
        let shared: Arc<dyn PortLock> = Arc::new(InProcessLock::new("/dev/ttyUSB2"));

        registry.install("/dev/ttyUSB2", Arc::clone(&shared)).unwrap();
        assert!(Arc::ptr_eq(&registry.lock_for("/dev/ttyUSB2").unwrap(), &shared));

        let err = registry
            .install("/dev/ttyUSB2", Arc::new(InProcessLock::new("/dev/ttyUSB2")))
            .unwrap_err();
        assert!(matches!(err, AtError::Configuration(_)));
    }

    #[test]
    fn test_factory_errors_propagate() {
        let registry = LockRegistry::file_locks("/nonexistent/lock/dir");
        assert!(registry.lock_for("/dev/ttyUSB2").is_err());
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_aliases_share_one_lock() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("ttyUSB2");
        std::fs::write(&node, "").unwrap();
        let alias = dir.path().join("usb-SimTech_SIM7600-if02");
        std::os::unix::fs::symlink(&node, &alias).unwrap();

        let registry = LockRegistry::new();
        let by_node = registry.lock_for(node.to_str().unwrap()).unwrap();
        let by_alias = registry.lock_for(alias.to_str().unwrap()).unwrap();

        assert!(Arc::ptr_eq(&by_node, &by_alias));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&LockRegistry::global(), &LockRegistry::global()));
    }
}
