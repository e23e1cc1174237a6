//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SIM7600";

/// Config file name
const CONFIG_FILE_NAME: &str = "sim7600.toml";

/// Per-user config subdirectory
const APP_DIR_NAME: &str = "sim7600";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SIM7600_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SIM7600_CONFIG` environment variable (explicit path)
    /// 2. `./sim7600.toml` (current directory)
    /// 3. `~/.config/sim7600/sim7600.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\sim7600\sim7600.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables override file values, then the result is
    /// validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        debug!(path = ?config_path, "configuration loaded");
        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides that fail to parse are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read `SIM7600_<key>` and parse it, if set.
fn env_value<T>(key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let var = format!("{ENV_PREFIX}_{key}");
    match std::env::var(&var) {
        Ok(value) => match value.trim().parse::<T>().map_err(|e| e.to_string()) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(reason) => Err(ConfigError::Env {
                reason,
                var,
                value,
            }),
        },
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern `SIM7600_<SECTION>_<KEY>`, e.g.
/// `SIM7600_SERIAL_PORT=/dev/ttyUSB3` or `SIM7600_LOCK_MODE=file`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some(val) = env_value("SERIAL_PORT")? {
        config.serial.port = val;
    }
    if let Some(val) = env_value("SERIAL_BAUD")? {
        config.serial.baud = val;
    }
    if let Some(val) = env_value("SERIAL_TIMEOUT_MS")? {
        config.serial.timeout_ms = val;
    }
    if let Some(val) = env_value("SERIAL_HARDWARE_FLOW_CONTROL")? {
        config.serial.hardware_flow_control = val;
    }

    if let Some(val) = env_value("LOCK_MODE")? {
        config.lock.mode = val;
    }
    if let Some(val) = env_value::<String>("LOCK_DIR")? {
        config.lock.lock_dir = PathBuf::from(val);
    }

    if let Some(val) = env_value("POWER_GPIO_PIN")? {
        config.power.gpio_pin = Some(val);
    }

    if let Some(val) = env_value("LOGGING_LEVEL")? {
        config.logging.level = val;
    }
    if let Some(val) = env_value("LOGGING_FORMAT")? {
        config.logging.format = val;
    }

    Ok(())
}

impl Config {
    /// Reject settings no port can be opened with.
    ///
    /// The loader calls this after env overrides; callers layering further
    /// overrides (command-line flags) call it again.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |key: &'static str, reason: &'static str| -> ConfigResult<()> {
            Err(ConfigError::Invalid { key, reason })
        };
        if self.serial.port.trim().is_empty() {
            return invalid("serial.port", "must not be empty");
        }
        if self.serial.baud == 0 {
            return invalid("serial.baud", "must be positive");
        }
        if self.serial.timeout_ms == 0 {
            return invalid("serial.timeout_ms", "must be positive");
        }
        Ok(())
    }
}
