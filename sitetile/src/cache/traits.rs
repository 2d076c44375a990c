//! Core traits for the cache service.
//!
//! The `Cache` trait is a small key-value interface with string keys and raw
//! byte values. Every provider implements it, so callers can hold any backend
//! as `Arc<dyn Cache>`.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use sitetile::cache::{CacheService, ServiceCacheConfig};
//!
//! let service = CacheService::start(ServiceCacheConfig::memory(512 * 1024 * 1024)).await?;
//!
//! let cache = service.cache();
//! cache.set("key", vec![1, 2, 3], Duration::from_secs(60)).await?;
//! let value = cache.get("key").await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum ServiceCacheError {
    /// The backing store cannot be reached.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// The cache service is shutting down.
    #[error("Cache is shutting down")]
    ShuttingDown,

    /// Key exceeds maximum allowed size.
    #[error("Key too large: {size} bytes (max: {max})")]
    KeyTooLarge { size: usize, max: usize },

    /// Value exceeds maximum allowed size.
    #[error("Value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// Provider-specific error.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl ServiceCacheError {
    /// Whether the error means the store could not be used at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ServiceCacheError::Unavailable(_) | ServiceCacheError::ShuttingDown
        )
    }
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Generic cache interface for key-value storage.
///
/// The interface knows nothing about tiles; the tile client layers key
/// derivation and metrics on top of it.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` for use across async tasks.
///
/// # Dyn Compatibility
///
/// Async methods return boxed futures so the trait can be used as
/// `Arc<dyn Cache>`, which is how tests swap in failing or recording caches.
pub trait Cache: Send + Sync {
    /// Store a value that expires after `ttl`.
    ///
    /// If the key already exists, the value and its expiry are replaced.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The value to store
    /// * `ttl` - Time-to-live of this entry
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), ServiceCacheError>>;

    /// Retrieve a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists and has not expired
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if the store failed
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>>;

    /// Delete a value by key, returning whether it existed.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    /// Check if a key exists without retrieving the value.
    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    /// Number of entries held, when the provider can tell cheaply.
    fn entry_count(&self) -> Option<u64> {
        None
    }

    /// Whether written values can be read back later.
    ///
    /// Providers that drop every write return `false`, and callers skip
    /// write-back for them.
    fn retains_entries(&self) -> bool {
        true
    }

    /// Short provider name for logs and stats.
    fn provider_name(&self) -> &'static str;
}
