//! Shared setup for commands that talk to the database.
//!
//! `CliRunner` loads the configuration, installs logging and owns the Tokio
//! runtime the command runs on.

use std::future::Future;
use std::path::Path;

use tokio::runtime::Runtime;
use tracing::info;

use sitetile::app::{AppConfig, SiteTileApp};
use sitetile::config::ConfigFile;
use sitetile::log::{init_logging, LoggingConfig, LoggingGuard};

use crate::error::CliError;

pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load configuration, start logging and build the runtime.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = load_config(config_path)?;

        let mut logging = LoggingConfig::from_settings(&config.logging);
        if verbose {
            logging = logging.verbose();
        }
        let guard = init_logging(&logging)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            config,
            runtime,
            _logging: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(version = sitetile::VERSION, command, "SiteTile starting");
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Start the application from the loaded configuration.
    pub fn start_app(&self) -> Result<SiteTileApp, CliError> {
        let app_config = AppConfig::from_config_file(&self.config)?;
        Ok(self.block_on(SiteTileApp::start(app_config))?)
    }
}

/// Load the configuration from an explicit path or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path).map_err(|e| {
            CliError::Config(format!("{}: {}", path.display(), e))
        })?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}
