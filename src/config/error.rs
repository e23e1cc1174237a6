//! Errors from loading, overriding and saving `sim7600.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax error, unknown enum value or wrong type in the TOML file.
    #[error("{} is not a valid sim7600.toml: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A setting outside its allowed range, whichever layer it came from.
    #[error("{key} {reason}")]
    Invalid {
        /// Dotted `section.key`, e.g. `serial.baud`.
        key: &'static str,
        reason: &'static str,
    },

    /// A `SIM7600_*` override that does not parse as its setting's type.
    #[error("{var}={value:?}: {reason}")]
    Env {
        var: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
