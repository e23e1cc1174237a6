//! Port abstraction layer for serial communication.
//!
//! Provides the adapter trait plus hardware and mock implementations, so the
//! transport can be exercised without a modem attached.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::SyncSerialPort;
pub use traits::*;

/// Key identifying the device behind `port`.
///
/// Symlinks such as `/dev/serial/by-id/...` resolve to the device node, so
/// every alias of one modem maps to the same key. Names that do not exist
/// on the filesystem (`COM3`, mock ports) are returned unchanged.
pub fn device_key(port: &str) -> String {
    std::fs::canonicalize(port)
        .ok()
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| port.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_device_key_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("ttyUSB2");
        std::fs::write(&node, "").unwrap();
        let alias = dir.path().join("usb-SimTech_SIM7600-if02");
        std::os::unix::fs::symlink(&node, &alias).unwrap();

        assert_eq!(
            device_key(alias.to_str().unwrap()),
            device_key(node.to_str().unwrap())
        );
    }

    #[test]
    fn test_device_key_keeps_unknown_names() {
        assert_eq!(device_key("COM3"), "COM3");
        assert_eq!(device_key("/dev/nonexistent_sim7600"), "/dev/nonexistent_sim7600");
    }
}
