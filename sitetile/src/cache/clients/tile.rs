//! Tile cache client.
//!
//! This client wraps a generic `Cache` with:
//! - Key selection: lookups use the fingerprint's lookup key, write-back
//!   always targets the published key
//! - A fixed time-to-live for every entry
//! - Error absorption: a failing store behaves like a miss
//! - Metrics injection: hit/miss/error and write-back reporting
//!
//! Write-back runs on its own task. The caller gets its payload without
//! waiting for the store, and a write that has been issued completes even if
//! the request that triggered it is cancelled.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::traits::Cache;
use crate::fingerprint::TileFingerprint;
use crate::telemetry::TileMetrics;

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The tile was cached.
    Hit(Bytes),
    /// The tile was not cached.
    Miss,
    /// The store could not be used; treat as a miss and skip write-back.
    Unavailable,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Cache client for encoded tiles.
#[derive(Clone)]
pub struct TileCacheClient {
    /// The underlying generic cache.
    cache: Arc<dyn Cache>,

    /// Lifetime of every written entry.
    ttl: Duration,

    /// Optional metrics for hit/miss reporting.
    metrics: Option<Arc<TileMetrics>>,
}

impl TileCacheClient {
    /// Create a new tile cache client without metrics.
    ///
    /// # Arguments
    ///
    /// * `cache` - The underlying cache implementation
    /// * `ttl` - Lifetime of written tiles
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            metrics: None,
        }
    }

    /// Create a new tile cache client with metrics.
    pub fn with_metrics(cache: Arc<dyn Cache>, ttl: Duration, metrics: Arc<TileMetrics>) -> Self {
        Self {
            cache,
            ttl,
            metrics: Some(metrics),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Name of the backing provider.
    pub fn provider_name(&self) -> &'static str {
        self.cache.provider_name()
    }

    /// Look a tile up by its lookup key.
    ///
    /// Never fails: store errors are logged, counted and reported as
    /// [`CacheLookup::Unavailable`].
    pub async fn lookup(&self, fingerprint: &TileFingerprint) -> CacheLookup {
        let key = fingerprint.lookup_key();
        match self.cache.get(&key).await {
            Ok(Some(data)) => {
                debug!(key = %key, size_bytes = data.len(), "Tile cache hit");
                if let Some(ref m) = self.metrics {
                    m.cache_hit();
                }
                CacheLookup::Hit(Bytes::from(data))
            }
            Ok(None) => {
                debug!(key = %key, "Tile cache miss");
                if let Some(ref m) = self.metrics {
                    m.cache_miss();
                }
                CacheLookup::Miss
            }
            Err(e) => {
                warn!(error = %e, key = %key, "Tile cache get failed, treating as miss");
                if let Some(ref m) = self.metrics {
                    m.cache_miss();
                    m.cache_error();
                }
                CacheLookup::Unavailable
            }
        }
    }

    /// Write a tile to its published key on a background task.
    ///
    /// Returns the task handle; callers normally drop it. Returns `None`
    /// without spawning when the provider keeps nothing. Must be called
    /// from within a Tokio runtime.
    pub fn spawn_write_back(
        &self,
        fingerprint: &TileFingerprint,
        data: Bytes,
    ) -> Option<JoinHandle<()>> {
        if !self.cache.retains_entries() {
            return None;
        }
        let key = fingerprint.published_key();
        let cache = Arc::clone(&self.cache);
        let metrics = self.metrics.clone();
        let ttl = self.ttl;

        Some(tokio::spawn(async move {
            let size = data.len();
            match cache.set(&key, data.to_vec(), ttl).await {
                Ok(()) => {
                    debug!(key = %key, size_bytes = size, "Tile written back");
                    if let Some(m) = metrics {
                        m.write_back_completed();
                    }
                }
                Err(e) => {
                    warn!(error = %e, key = %key, "Tile cache set failed");
                    if let Some(m) = metrics {
                        m.write_back_failed();
                        m.cache_error();
                    }
                }
            }
        }))
    }
}

impl std::fmt::Debug for TileCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCacheClient")
            .field("provider", &self.cache.provider_name())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::{BoxFuture, ServiceCacheError};
    use crate::cache::{CacheService, ServiceCacheConfig};
    use crate::fingerprint::DEFAULT_NAMESPACE;
    use crate::tile::TileRequest;
    use chrono::{TimeZone, Utc};

    const TTL: Duration = Duration::from_secs(60);

    struct DownCache;

    impl Cache for DownCache {
        fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
            Box::pin(async { Err(ServiceCacheError::Unavailable("connection refused".into())) })
        }

        fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
            Box::pin(async { Err(ServiceCacheError::Unavailable("connection refused".into())) })
        }

        fn delete(&self, _key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
            Box::pin(async { Err(ServiceCacheError::Unavailable("connection refused".into())) })
        }

        fn contains(&self, _key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
            Box::pin(async { Err(ServiceCacheError::Unavailable("connection refused".into())) })
        }

        fn provider_name(&self) -> &'static str {
            "down"
        }
    }

    fn fingerprint(session: Option<&str>) -> TileFingerprint {
        let request = TileRequest::parse("M1", "10", "511", "511", "2021", session).unwrap();
        let modified = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        TileFingerprint::new(DEFAULT_NAMESPACE, &request, modified)
    }

    #[tokio::test]
    async fn test_write_back_then_hit() {
        let service = CacheService::start(ServiceCacheConfig::memory(1_000_000))
            .await
            .unwrap();
        let metrics = Arc::new(TileMetrics::new());
        let client = TileCacheClient::with_metrics(service.cache(), TTL, Arc::clone(&metrics));
        let fp = fingerprint(None);

        assert_eq!(client.lookup(&fp).await, CacheLookup::Miss);

        client
            .spawn_write_back(&fp, Bytes::from_static(b"tile"))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(
            client.lookup(&fp).await,
            CacheLookup::Hit(Bytes::from_static(b"tile"))
        );
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.write_backs, 1);
    }

    #[tokio::test]
    async fn test_session_write_back_lands_on_published_key() {
        let service = CacheService::start(ServiceCacheConfig::memory(1_000_000))
            .await
            .unwrap();
        let client = TileCacheClient::new(service.cache(), TTL);
        let session = fingerprint(Some("abc"));

        client
            .spawn_write_back(&session, Bytes::from_static(b"edited"))
            .unwrap()
            .await
            .unwrap();

        let cache = service.cache();
        assert!(cache.contains(&session.published_key()).await.unwrap());
        assert!(!cache.contains(&session.lookup_key()).await.unwrap());
        assert_eq!(client.lookup(&session).await, CacheLookup::Miss);
        assert!(client.lookup(&fingerprint(None)).await.is_hit());
    }

    #[tokio::test]
    async fn test_unavailable_store_is_absorbed() {
        let metrics = Arc::new(TileMetrics::new());
        let client = TileCacheClient::with_metrics(Arc::new(DownCache), TTL, Arc::clone(&metrics));
        let fp = fingerprint(None);

        assert_eq!(client.lookup(&fp).await, CacheLookup::Unavailable);
        client
            .spawn_write_back(&fp, Bytes::from_static(b"tile"))
            .unwrap()
            .await
            .unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_errors, 2);
        assert_eq!(snapshot.write_back_failures, 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_skips_write_back() {
        let service = CacheService::start(ServiceCacheConfig::disabled())
            .await
            .unwrap();
        let metrics = Arc::new(TileMetrics::new());
        let client = TileCacheClient::with_metrics(service.cache(), TTL, Arc::clone(&metrics));
        let fp = fingerprint(None);

        assert!(client
            .spawn_write_back(&fp, Bytes::from_static(b"tile"))
            .is_none());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.write_backs, 0);
        assert_eq!(snapshot.write_back_failures, 0);
    }
}
