//! Configuration file handling.
//!
//! The service reads `~/.sitetile/config.ini` (or a path given on the
//! command line). [`ConfigFile`] holds one struct per INI section;
//! [`ConfigKey`] addresses single settings for the `config get`/`config set`
//! commands.

mod file;
mod keys;
mod size;

use thiserror::Error;

pub use file::{
    config_directory, config_file_path, CacheProviderKind, CacheSettings, ConfigFile,
    DatabaseSettings, LoggingSettings, ServerSettings, TilesSettings,
};
pub use keys::ConfigKey;
pub use size::{format_size, parse_size};

/// Errors raised while loading or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid value {value:?} for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid size {0:?} (expected e.g. 512MB or 2GB)")]
    InvalidSize(String),

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("could not determine home directory")]
    NoHomeDirectory,
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        key: &'static str,
        value: &str,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            section,
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
