//! SIM7600 AT command driver.
//!
//! Sends AT commands to a SIMCom SIM7600 cellular module over a serial port
//! and collects the reply up to its final result code.
//!
//! # Modules
//!
//! - `lock`: per-port mutual exclusion, in-process or via `flock`
//! - `port`: serial adapter trait with hardware and mock implementations
//! - `transport`: one open port with line-buffered reads
//! - `engine`: the command/response cycle
//! - `command` / `response`: command lines and terminator classification
//! - `power`: PWRKEY sequencing
//! - `identity` / `discovery`: `ATI` parsing and port scanning
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use sim7600_at::{AtCommand, AtEngine, ErrorCategory};
//!
//! let modem = AtEngine::open("/dev/ttyUSB2", 115_200)?;
//! let signal = modem.send("AT+CSQ")?;
//! println!("{:?}", signal.body());
//!
//! modem.send(AtCommand::new("AT+CREG?").category(ErrorCategory::Network))?;
//! # Ok::<(), sim7600_at::AtError>(())
//! ```

pub mod command;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod identity;
pub mod lock;
pub mod logging;
pub mod port;
pub mod power;
pub mod response;
pub mod transport;

pub use command::AtCommand;
pub use discovery::{discover, probe, DiscoveredDevice};
pub use engine::AtEngine;
pub use error::{AtError, AtResult, DeviceFailure, ErrorCategory};
pub use identity::DeviceIdentity;
pub use lock::{FileLock, InProcessLock, LockRegistry, PortLock, PortLockGuard};
pub use port::{MockSerialPort, PortError, SerialPortAdapter};
pub use power::{NoPowerControl, PowerControl, SysfsPowerKey};
pub use response::{classify, LineKind, Response};
pub use transport::Transport;

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
