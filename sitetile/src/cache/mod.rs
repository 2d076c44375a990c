//! Tile cache.
//!
//! A small key-value layer with interchangeable providers and a tile client
//! that adds freshness keys, TTL, metrics and background write-back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              TileCacheClient                 │
//! │  lookup key / published key, fixed TTL,      │
//! │  errors absorbed as misses, spawned writes   │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │               Arc<dyn Cache>                 │
//! │        string keys -> byte values            │
//! └─────────┬──────────────┬──────────────┬──────┘
//!           ▼              ▼              ▼
//!      MemoryCache     RedisCache     NullCache
//!       (moka)      (deadpool-redis)  (disabled)
//! ```

pub mod clients;
pub mod providers;
mod service;
mod traits;

pub use clients::{CacheLookup, TileCacheClient};
pub use providers::{MemoryCacheProvider, NullCacheProvider, RedisCacheProvider, RedisSettings};
pub use service::{
    CacheService, ProviderConfig, ServiceCacheConfig, DEFAULT_MEMORY_CACHE_SIZE, DEFAULT_TILE_TTL,
};
pub use traits::{BoxFuture, Cache, ServiceCacheError};
