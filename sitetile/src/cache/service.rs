//! Cache service lifecycle.
//!
//! `CacheService` owns the configured provider from startup to shutdown and
//! hands it out as `Arc<dyn Cache>`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::providers::{MemoryCacheProvider, NullCacheProvider, RedisCacheProvider, RedisSettings};
use super::traits::{Cache, ServiceCacheError};

/// Default memory cache size (512 MB).
pub const DEFAULT_MEMORY_CACHE_SIZE: u64 = 512 * 1024 * 1024;

/// Default entry lifetime (7 days).
pub const DEFAULT_TILE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Which provider backs the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// In-process moka cache bounded by size.
    Memory { max_size_bytes: u64 },
    /// Shared Redis server.
    Redis(RedisSettings),
    /// No caching; every lookup misses.
    Disabled,
}

/// Configuration for [`CacheService::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCacheConfig {
    pub provider: ProviderConfig,
}

impl ServiceCacheConfig {
    pub fn memory(max_size_bytes: u64) -> Self {
        Self {
            provider: ProviderConfig::Memory { max_size_bytes },
        }
    }

    pub fn redis(settings: RedisSettings) -> Self {
        Self {
            provider: ProviderConfig::Redis(settings),
        }
    }

    pub fn disabled() -> Self {
        Self {
            provider: ProviderConfig::Disabled,
        }
    }
}

impl Default for ServiceCacheConfig {
    fn default() -> Self {
        Self::memory(DEFAULT_MEMORY_CACHE_SIZE)
    }
}

enum ProviderHandle {
    Memory(Arc<MemoryCacheProvider>),
    Redis(Arc<RedisCacheProvider>),
    Disabled(Arc<NullCacheProvider>),
}

/// Running cache service.
pub struct CacheService {
    handle: ProviderHandle,
}

impl CacheService {
    /// Start the configured provider.
    ///
    /// A Redis server that cannot be reached at startup is not fatal: the
    /// service starts anyway and requests degrade to cache misses until it
    /// comes back.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider configuration itself is invalid.
    pub async fn start(config: ServiceCacheConfig) -> Result<Self, ServiceCacheError> {
        let handle = match config.provider {
            ProviderConfig::Memory { max_size_bytes } => {
                info!(max_size_bytes, "Starting memory tile cache");
                ProviderHandle::Memory(Arc::new(MemoryCacheProvider::new(max_size_bytes)))
            }
            ProviderConfig::Redis(settings) => {
                let provider = RedisCacheProvider::new(&settings)?;
                match provider.ping().await {
                    Ok(()) => info!("Connected to Redis tile cache"),
                    Err(e) => warn!(error = %e, "Redis tile cache unreachable, continuing without it"),
                }
                ProviderHandle::Redis(Arc::new(provider))
            }
            ProviderConfig::Disabled => {
                info!("Tile cache disabled");
                ProviderHandle::Disabled(Arc::new(NullCacheProvider))
            }
        };
        Ok(Self { handle })
    }

    /// The provider as a trait object.
    pub fn cache(&self) -> Arc<dyn Cache> {
        match &self.handle {
            ProviderHandle::Memory(p) => Arc::clone(p) as Arc<dyn Cache>,
            ProviderHandle::Redis(p) => Arc::clone(p) as Arc<dyn Cache>,
            ProviderHandle::Disabled(p) => Arc::clone(p) as Arc<dyn Cache>,
        }
    }

    /// Name of the running provider.
    pub fn provider_name(&self) -> &'static str {
        self.cache().provider_name()
    }

    /// Release provider resources.
    pub async fn shutdown(self) {
        match self.handle {
            ProviderHandle::Memory(p) => p.run_pending_tasks().await,
            ProviderHandle::Redis(p) => p.close(),
            ProviderHandle::Disabled(_) => {}
        }
        info!("Tile cache stopped");
    }
}
