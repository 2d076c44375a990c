//! Logging setup.
//!
//! Installs a global `tracing` subscriber with:
//! - an `EnvFilter` (level from config, `RUST_LOG` wins when set)
//! - a stderr formatter with local timestamps
//! - an optional daily-rolling log file written through a non-blocking worker
//!
//! The returned [`LoggingGuard`] flushes the file writer when dropped and
//! must be held for the life of the process.

use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::AppError;
use crate::config::LoggingSettings;

/// Default file name prefix for rolling log files.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "sitetile.log";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `sitetile=debug,sqlx=warn`.
    pub level: String,
    /// Directory for rolling log files; `None` logs to stderr only.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level.clone(),
            directory: settings.directory.clone(),
            ..Self::default()
        }
    }

    /// Raise the level to `debug` (the `--verbose` flag).
    pub fn verbose(mut self) -> Self {
        self.level = "debug".to_string();
        self
    }
}

/// Keeps the non-blocking file writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file", &self._file.is_some())
            .finish()
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the level directive does not parse, the log directory cannot be
/// created, or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, AppError> {
    let filter = build_filter(&config.level)?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(Rfc3339))
        .with_target(false);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let (writer, guard) = file_writer(dir, &config.file_prefix)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::new(Rfc3339));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

fn build_filter(level: &str) -> Result<EnvFilter, AppError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_filter(level)
}

fn parse_filter(level: &str) -> Result<EnvFilter, AppError> {
    EnvFilter::try_new(level)
        .map_err(|e| AppError::Logging(format!("invalid log level '{}': {}", level, e)))
}

fn file_writer(
    dir: &Path,
    prefix: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), AppError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::Logging(format!(
            "cannot create log directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    let appender = tracing_appender::rolling::daily(dir, prefix);
    Ok(tracing_appender::non_blocking(appender))
}
