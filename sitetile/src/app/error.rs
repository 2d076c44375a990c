//! Application error types.

use std::fmt;

use crate::cache::ServiceCacheError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors that can occur during application lifecycle.
#[derive(Debug)]
pub enum AppError {
    /// Failed to connect the spatial store.
    StoreStart(StoreError),

    /// Failed to start the tile cache service.
    CacheStart(ServiceCacheError),

    /// Configuration error.
    Config(String),

    /// Failed to install the log subscriber.
    Logging(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::StoreStart(e) => {
                write!(f, "Failed to connect spatial store: {}", e)
            }
            AppError::CacheStart(e) => {
                write!(f, "Failed to start tile cache service: {}", e)
            }
            AppError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            AppError::Logging(msg) => {
                write!(f, "Failed to initialize logging: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::StoreStart(e) => Some(e),
            AppError::CacheStart(e) => Some(e),
            AppError::Config(_) => None,
            AppError::Logging(_) => None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::StoreStart(e)
    }
}

impl From<ServiceCacheError> for AppError {
    fn from(e: ServiceCacheError) -> Self {
        AppError::CacheStart(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
