//! CLI error types.

use std::fmt;

use sitetile::app::AppError;
use sitetile::config::ConfigError;
use sitetile::tile::TileServiceError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or unreadable configuration.
    Config(String),

    /// Application startup failed.
    App(AppError),

    /// A tile request failed.
    Tile(TileServiceError),

    /// The HTTP server failed.
    Serve(String),

    /// File or runtime I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Tile(e) => write!(f, "Tile request failed: {}", e),
            CliError::Serve(msg) => write!(f, "Server error: {}", msg),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::App(e) => Some(e),
            CliError::Tile(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::Config(_) | CliError::Serve(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<TileServiceError> for CliError {
    fn from(e: TileServiceError) -> Self {
        CliError::Tile(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
