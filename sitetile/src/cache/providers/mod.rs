//! Cache provider implementations.
//!
//! Each provider implements the `Cache` trait. Providers are normally created
//! through `CacheService::start()`.
//!
//! # Available Providers
//!
//! - [`MemoryCacheProvider`]: in-process cache using moka
//! - [`RedisCacheProvider`]: shared cache on a Redis server
//! - [`NullCacheProvider`]: stores nothing, for running without a cache

mod memory;
mod null;
mod redis;

pub use memory::MemoryCacheProvider;
pub use null::NullCacheProvider;
pub use self::redis::{RedisCacheProvider, RedisSettings};
