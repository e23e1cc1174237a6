//! Configuration schema definitions.
//!
//! All sections deserialize with defaults, so a file only needs the keys it
//! changes.

use crate::port::PortConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port configuration
    pub serial: SerialConfig,
    /// Port lock configuration
    pub lock: LockConfig,
    /// Power key configuration
    pub power: PowerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path of the modem's AT port
    pub port: String,
    /// Baud rate
    pub baud: u32,
    /// Default per-command timeout in milliseconds
    pub timeout_ms: u64,
    /// RTS/CTS flow control, for modems on a UART (e.g. a Pi HAT on ttyS0)
    pub hardware_flow_control: bool,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB2".to_string(),
            baud: 115_200,
            timeout_ms: 5000,
            hardware_flow_control: false,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Get the default command timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Line settings for opening the configured port.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            hardware_flow_control: self.hardware_flow_control,
            ..PortConfiguration::with_baud(self.baud)
        }
    }
}

/// Which kind of port lock the registry builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Threads of this process only
    #[default]
    InProcess,
    /// `flock` on a lock file, excludes other processes too
    File,
}

impl std::str::FromStr for LockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in_process" | "in-process" | "process" => Ok(Self::InProcess),
            "file" => Ok(Self::File),
            other => Err(format!("unknown lock mode '{other}'")),
        }
    }
}

/// Port lock configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub mode: LockMode,
    /// Directory for `LCK..<device>` files in `file` mode
    pub lock_dir: PathBuf,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            mode: LockMode::InProcess,
            lock_dir: PathBuf::from("/var/lock"),
        }
    }
}

/// Power key configuration section.
///
/// Without a `gpio_pin` the modem is assumed to be powered externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// BCM GPIO number wired to the PWRKEY line (6 on the Waveshare HAT)
    pub gpio_pin: Option<u32>,
    /// Root of the sysfs GPIO interface
    pub sysfs_root: PathBuf,
    pub on_pulse_ms: u64,
    /// Boot time after the power-on pulse
    pub on_settle_ms: u64,
    pub off_pulse_ms: u64,
    /// Shutdown time after the power-off pulse
    pub off_settle_ms: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            gpio_pin: None,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            on_pulse_ms: 2000,
            on_settle_ms: 20_000,
            off_pulse_ms: 3000,
            off_settle_ms: 18_000,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud, 115_200);
        assert_eq!(config.serial.timeout(), Duration::from_secs(5));
        assert_eq!(config.lock.mode, LockMode::InProcess);
        assert_eq!(config.power.gpio_pin, None);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("modem".to_string(), "/dev/ttyUSB2".to_string());

        assert_eq!(config.resolve_port("modem"), "/dev/ttyUSB2");
        assert_eq!(config.resolve_port("/dev/ttyACM0"), "/dev/ttyACM0");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[lock]"));
        assert!(toml_str.contains("mode = \"in_process\""));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            port = "/dev/ttyACM0"
            baud = 9600
            hardware_flow_control = true

            [lock]
            mode = "file"
            lock_dir = "/run/lock"

            [power]
            gpio_pin = 6
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud, 9600);
        assert!(config.serial.port_configuration().hardware_flow_control);
        assert_eq!(config.serial.port_configuration().baud_rate, 9600);
        assert_eq!(config.lock.mode, LockMode::File);
        assert_eq!(config.lock.lock_dir, PathBuf::from("/run/lock"));
        assert_eq!(config.power.gpio_pin, Some(6));
        // Defaults should still work
        assert_eq!(config.serial.timeout_ms, 5000);
        assert_eq!(config.power.on_settle_ms, 20_000);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("file".parse::<LockMode>().unwrap(), LockMode::File);
        assert_eq!("in-process".parse::<LockMode>().unwrap(), LockMode::InProcess);
        assert!("shared".parse::<LockMode>().is_err());
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }
}
