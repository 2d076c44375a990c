//! In-memory cache provider using moka.
//!
//! Wraps `moka::future::Cache`, weighted by value size, with a per-entry
//! expiry so each `set` can carry its own TTL.

use std::time::{Duration, Instant};

use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::cache::traits::{BoxFuture, Cache, ServiceCacheError};

/// Cached value together with its requested time-to-live.
#[derive(Clone)]
struct Entry {
    data: Vec<u8>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache provider using moka.
///
/// Entries are evicted by size (LRU-ish, moka's TinyLFU) once the total
/// weight exceeds `max_size_bytes`, and individually when their TTL runs out.
pub struct MemoryCacheProvider {
    cache: MokaCache<String, Entry>,
    max_size_bytes: u64,
}

impl MemoryCacheProvider {
    /// Create a new memory cache provider.
    ///
    /// # Arguments
    ///
    /// * `max_size_bytes` - Maximum cache size in bytes
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            // Weight each entry by its data size
            .weigher(|key: &String, value: &Entry| -> u32 {
                (key.len() + value.data.len()).min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            cache,
            max_size_bytes,
        }
    }

    /// Maximum configured size in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Current weighted size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    /// Run moka's pending maintenance (eviction, expiry bookkeeping).
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Cache for MemoryCacheProvider {
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.cache.insert(key, Entry { data: value, ttl }).await;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await.map(|e| e.data)) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.remove(&key).await.is_some()) })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.contains_key(&key)) })
    }

    fn entry_count(&self) -> Option<u64> {
        Some(self.cache.entry_count())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
