//! Application configuration for `SiteTileApp`.
//!
//! `AppConfig` combines the settings of every component started by the
//! application: the spatial store pool, the tile cache provider and the
//! tile service itself.

use std::time::Duration;

use crate::cache::{RedisSettings, ServiceCacheConfig};
use crate::config::{CacheProviderKind, ConfigFile};
use crate::service::TileServiceConfig;
use crate::store::PgStoreConfig;

use super::error::AppError;

/// Application configuration combining all component configs.
///
/// This is the top-level configuration passed to `SiteTileApp::start()`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Spatial database connection settings.
    pub store: PgStoreConfig,

    /// Tile cache provider.
    pub cache: ServiceCacheConfig,

    /// Encoding, key and caching settings for the tile service.
    pub service: TileServiceConfig,
}

impl AppConfig {
    /// Create a config for the given database with default cache and tile
    /// settings.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            store: PgStoreConfig::new(database_url),
            cache: ServiceCacheConfig::default(),
            service: TileServiceConfig::default(),
        }
    }

    /// Replace the cache configuration.
    pub fn with_cache(mut self, cache: ServiceCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the tile service configuration.
    pub fn with_service(mut self, service: TileServiceConfig) -> Self {
        self.service = service;
        self
    }

    /// Create application config from the configuration file.
    ///
    /// # Errors
    ///
    /// Fails when no database URL is configured, or when the Redis provider
    /// is selected without a Redis URL.
    pub fn from_config_file(config: &ConfigFile) -> Result<Self, AppError> {
        let url = config
            .database
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::Config("database.url is not set".to_string()))?;

        let store = PgStoreConfig {
            url,
            pool_size: config.database.pool_size,
            connect_timeout: Duration::from_millis(config.database.connect_timeout_ms),
            statement_timeout: Duration::from_millis(config.database.statement_timeout_ms),
        };

        let cache = match config.cache.provider {
            CacheProviderKind::Memory => ServiceCacheConfig::memory(config.cache.memory_size),
            CacheProviderKind::Redis => {
                let url = config
                    .cache
                    .redis_url
                    .clone()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Config(
                            "cache.provider is redis but cache.redis_url is not set".to_string(),
                        )
                    })?;
                let mut settings = RedisSettings::new(url);
                settings.pool_size = config.cache.redis_pool_size;
                ServiceCacheConfig::redis(settings)
            }
            CacheProviderKind::None => ServiceCacheConfig::disabled(),
        };

        let service = TileServiceConfig {
            extent: config.tiles.extent,
            buffer: config.tiles.buffer,
            ttl: Duration::from_secs(config.cache.ttl_hours * 60 * 60),
            namespace: config.cache.namespace.clone(),
            coalesce: config.tiles.coalesce,
        };

        Ok(Self {
            store,
            cache,
            service,
        })
    }
}
