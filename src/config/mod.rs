//! Configuration module for the SIM7600 driver.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SIM7600_CONFIG` environment variable (explicit path)
//! 2. `./sim7600.toml` (current directory)
//! 3. `~/.config/sim7600/sim7600.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\sim7600\sim7600.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SIM7600_<SECTION>_<KEY>`:
//! - `SIM7600_SERIAL_PORT=/dev/ttyUSB3`
//! - `SIM7600_SERIAL_BAUD=115200`
//! - `SIM7600_SERIAL_TIMEOUT_MS=3000`
//! - `SIM7600_SERIAL_HARDWARE_FLOW_CONTROL=true`
//! - `SIM7600_LOCK_MODE=file`, `SIM7600_LOCK_DIR=/run/lock`
//! - `SIM7600_POWER_GPIO_PIN=6`
//! - `SIM7600_LOGGING_LEVEL=debug`, `SIM7600_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```rust,no_run
//! use sim7600_at::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Modem port: {}", config.serial.port);
//! println!("Baud: {}", config.serial.baud);
//! # Ok::<(), sim7600_at::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{
    Config, LockConfig, LockMode, LogFormat, LoggingConfig, PowerConfig, SerialConfig,
};
