//! Power-key control.
//!
//! SIM7600 boards on a Raspberry Pi header switch the module on and off by
//! pulsing the PWRKEY line. The capability is injected into the engine; the
//! default [`NoPowerControl`] leaves power to the hardware.

use crate::config::PowerConfig;
use crate::error::{AtError, AtResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Platform hook that switches the modem on and off.
#[cfg_attr(test, mockall::automock)]
pub trait PowerControl: Send + Sync + fmt::Debug {
    /// Run the power-on sequence and wait for the module to boot.
    fn power_on(&self) -> AtResult<()>;

    /// Run the power-off sequence and wait for the module to shut down.
    fn power_off(&self) -> AtResult<()>;

    /// Whether this control actually drives the power line.
    ///
    /// An engine with a managed control starts in the off state.
    fn is_managed(&self) -> bool {
        true
    }
}

/// Power is handled outside the driver; the modem is always considered on.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPowerControl;

impl PowerControl for NoPowerControl {
    fn power_on(&self) -> AtResult<()> {
        Ok(())
    }

    fn power_off(&self) -> AtResult<()> {
        Ok(())
    }

    fn is_managed(&self) -> bool {
        false
    }
}

/// PWRKEY driven through the sysfs GPIO interface.
#[derive(Debug, Clone)]
pub struct SysfsPowerKey {
    pin: u32,
    root: PathBuf,
    on_pulse: Duration,
    on_settle: Duration,
    off_pulse: Duration,
    off_settle: Duration,
}

impl SysfsPowerKey {
    pub fn new(pin: u32, root: impl Into<PathBuf>) -> Self {
        let defaults = PowerConfig::default();
        Self {
            pin,
            root: root.into(),
            on_pulse: Duration::from_millis(defaults.on_pulse_ms),
            on_settle: Duration::from_millis(defaults.on_settle_ms),
            off_pulse: Duration::from_millis(defaults.off_pulse_ms),
            off_settle: Duration::from_millis(defaults.off_settle_ms),
        }
    }

    pub fn with_timings(
        mut self,
        on_pulse: Duration,
        on_settle: Duration,
        off_pulse: Duration,
        off_settle: Duration,
    ) -> Self {
        self.on_pulse = on_pulse;
        self.on_settle = on_settle;
        self.off_pulse = off_pulse;
        self.off_settle = off_settle;
        self
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn write(path: &Path, value: &str) -> AtResult<()> {
        std::fs::write(path, value).map_err(AtError::Power)
    }

    /// Export the pin if needed and make it an output.
    fn prepare(&self) -> AtResult<()> {
        if !self.pin_dir().exists() {
            Self::write(&self.root.join("export"), &self.pin.to_string())?;
        }
        Self::write(&self.pin_dir().join("direction"), "out")
    }

    fn pulse(&self, hold: Duration, settle: Duration) -> AtResult<()> {
        self.prepare()?;
        let value = self.pin_dir().join("value");

        Self::write(&value, "1")?;
        thread::sleep(hold);
        Self::write(&value, "0")?;
        debug!(pin = self.pin, ?settle, "power key released, waiting for module");
        thread::sleep(settle);
        Ok(())
    }
}

impl PowerControl for SysfsPowerKey {
    fn power_on(&self) -> AtResult<()> {
        info!(pin = self.pin, "powering modem on");
        self.pulse(self.on_pulse, self.on_settle)
    }

    fn power_off(&self) -> AtResult<()> {
        info!(pin = self.pin, "powering modem off");
        self.pulse(self.off_pulse, self.off_settle)
    }
}

/// Build the power control described by the `[power]` section.
pub fn from_config(config: &PowerConfig) -> Box<dyn PowerControl> {
    match config.gpio_pin {
        Some(pin) => Box::new(
            SysfsPowerKey::new(pin, config.sysfs_root.clone()).with_timings(
                Duration::from_millis(config.on_pulse_ms),
                Duration::from_millis(config.on_settle_ms),
                Duration::from_millis(config.off_pulse_ms),
                Duration::from_millis(config.off_settle_ms),
            ),
        ),
        None => Box::new(NoPowerControl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(pin: u32, exported: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("export"), "").unwrap();
        if exported {
            std::fs::create_dir(dir.path().join(format!("gpio{pin}"))).unwrap();
        }
        dir
    }

    #[test]
    fn test_no_power_control_is_unmanaged() {
        assert!(!NoPowerControl.is_managed());
        assert!(NoPowerControl.power_on().is_ok());
        assert!(NoPowerControl.power_off().is_ok());
    }

    #[test]
    fn test_sysfs_pulse_leaves_line_low() {
        let sysfs = fake_sysfs(6, true);
        let key = SysfsPowerKey::new(6, sysfs.path()).with_timings(
            Duration::ZERO,
            Duration::ZERO,
            Duration::ZERO,
            Duration::ZERO,
        );

        key.power_on().unwrap();
        let pin = sysfs.path().join("gpio6");
        assert_eq!(std::fs::read_to_string(pin.join("direction")).unwrap(), "out");
        assert_eq!(std::fs::read_to_string(pin.join("value")).unwrap(), "0");
        assert_eq!(std::fs::read_to_string(sysfs.path().join("export")).unwrap(), "");
    }

    #[test]
    fn test_sysfs_exports_missing_pin() {
        let sysfs = fake_sysfs(17, false);
        let key = SysfsPowerKey::new(17, sysfs.path());

        // The fake export file does not create gpio17/, so preparing fails
        // after the export write.
        assert!(matches!(key.power_off(), Err(AtError::Power(_))));
        assert_eq!(std::fs::read_to_string(sysfs.path().join("export")).unwrap(), "17");
    }

    #[test]
    fn test_from_config() {
        let mut config = PowerConfig::default();
        assert!(!from_config(&config).is_managed());

        config.gpio_pin = Some(6);
        assert!(from_config(&config).is_managed());
    }
}
