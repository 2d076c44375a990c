//! Tile service facade.
//!
//! `TileService` runs one request through every component:
//!
//! ```text
//! TileRequest
//!     │
//!     ▼
//! FingerprintDeriver ── latest modification ──► lookup key / published key
//!     │
//!     ▼
//! TileCacheClient.lookup ── hit ──────────────────────────────► payload
//!     │ miss (or cache unavailable)
//!     ▼
//! RequestCoalescer ── identical request in flight ── wait ────► payload
//!     │ leader
//!     ▼
//! SpatialStore.fetch_tile_rows ─► temporal::resolve ─► TileEncoder
//!     │
//!     ├──► spawn write-back to published key (skipped if cache unavailable)
//!     ▼
//! payload
//! ```
//!
//! Nothing is retried here. Store and encoding failures go straight back to
//! the caller; cache failures are absorbed by the cache client.

mod payload;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use crate::cache::{Cache, CacheLookup, TileCacheClient, DEFAULT_TILE_TTL};
use crate::coalesce::{CoalesceResult, RequestCoalescer};
use crate::coord::tile_to_lat_lon;
use crate::encode::{TileEncoder, DEFAULT_EXTENT};
use crate::fingerprint::{FingerprintDeriver, TileFingerprint, DEFAULT_NAMESPACE};
use crate::store::{SpatialStore, TileQuery, DEFAULT_BUFFER};
use crate::telemetry::{TelemetrySnapshot, TileMetrics};
use crate::temporal;
use crate::tile::{TileRequest, TileServiceError};

pub use payload::{PayloadSource, TilePayload};

/// Settings for [`TileService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileServiceConfig {
    /// Tile-local coordinate range.
    pub extent: u32,
    /// Clipping buffer around the tile, in tile units.
    pub buffer: u32,
    /// Lifetime of cached tiles.
    pub ttl: Duration,
    /// Namespace tag at the start of every cache key.
    pub namespace: String,
    /// Whether identical concurrent misses share one computation.
    pub coalesce: bool,
}

impl Default for TileServiceConfig {
    fn default() -> Self {
        Self {
            extent: DEFAULT_EXTENT,
            buffer: DEFAULT_BUFFER,
            ttl: DEFAULT_TILE_TTL,
            namespace: DEFAULT_NAMESPACE.to_string(),
            coalesce: true,
        }
    }
}

/// Produces vector tiles for requests, backed by a cache.
pub struct TileService {
    store: Arc<dyn SpatialStore>,
    deriver: FingerprintDeriver,
    cache: TileCacheClient,
    encoder: TileEncoder,
    coalescer: Option<RequestCoalescer>,
    metrics: Arc<TileMetrics>,
    config: TileServiceConfig,
}

impl TileService {
    /// Create a service over injected store and cache handles.
    ///
    /// # Arguments
    ///
    /// * `store` - Spatial store the tiles are computed from
    /// * `cache` - Cache provider for encoded tiles
    /// * `config` - Encoding, key and caching settings
    pub fn new(
        store: Arc<dyn SpatialStore>,
        cache: Arc<dyn Cache>,
        config: TileServiceConfig,
    ) -> Self {
        Self::with_metrics(store, cache, config, Arc::new(TileMetrics::new()))
    }

    /// Create a service that records into existing metrics.
    pub fn with_metrics(
        store: Arc<dyn SpatialStore>,
        cache: Arc<dyn Cache>,
        config: TileServiceConfig,
        metrics: Arc<TileMetrics>,
    ) -> Self {
        let deriver = FingerprintDeriver::new(Arc::clone(&store), config.namespace.clone());
        let cache = TileCacheClient::with_metrics(cache, config.ttl, Arc::clone(&metrics));
        let coalescer = config.coalesce.then(RequestCoalescer::new);

        Self {
            store,
            deriver,
            cache,
            encoder: TileEncoder::new(config.extent),
            coalescer,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &TileServiceConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<TileMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current counter values.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    /// Derive the cache keys for a request without fetching the tile.
    pub async fn fingerprint(
        &self,
        request: &TileRequest,
    ) -> Result<TileFingerprint, TileServiceError> {
        self.deriver.derive(request).await
    }

    /// Return the tile for a request.
    ///
    /// An empty payload means the tile has no features; it is a success,
    /// not an error.
    #[instrument(
        skip(self, request),
        fields(
            model_run = %request.model_run(),
            zoom = request.coord().zoom,
            x = request.coord().x,
            y = request.coord().y,
            year = request.year().value(),
            session = request.session().is_some()
        )
    )]
    pub async fn get_tile(&self, request: &TileRequest) -> Result<TilePayload, TileServiceError> {
        self.metrics.request_started();
        match self.serve(request).await {
            Ok(payload) => {
                self.metrics.bytes_served(payload.len());
                Ok(payload)
            }
            Err(e) => {
                self.metrics.request_failed();
                if e.kind().is_client_error() {
                    debug!(error = %e, "Rejected tile request");
                } else {
                    warn!(error = %e, kind = %e.kind(), "Tile request failed");
                }
                Err(e)
            }
        }
    }

    async fn serve(&self, request: &TileRequest) -> Result<TilePayload, TileServiceError> {
        let fingerprint = self.deriver.derive(request).await?;

        let cache_usable = match self.cache.lookup(&fingerprint).await {
            CacheLookup::Hit(bytes) => return Ok(TilePayload::new(bytes, PayloadSource::Cache)),
            CacheLookup::Miss => true,
            CacheLookup::Unavailable => false,
        };

        let Some(ref coalescer) = self.coalescer else {
            return self
                .compute_and_store(request, &fingerprint, cache_usable)
                .await
                .map(|bytes| TilePayload::new(bytes, PayloadSource::Computed));
        };

        match coalescer.register(&fingerprint.lookup_key()) {
            CoalesceResult::NewRequest(in_flight) => {
                let result = self
                    .compute_and_store(request, &fingerprint, cache_usable)
                    .await
                    .map_err(Arc::new);
                in_flight.complete(result.clone());
                match result {
                    Ok(bytes) => Ok(TilePayload::new(bytes, PayloadSource::Computed)),
                    Err(shared) => Err(match Arc::try_unwrap(shared) {
                        Ok(e) => e,
                        Err(shared) => TileServiceError::Coalesced(shared),
                    }),
                }
            }
            CoalesceResult::Coalesced(mut rx) => {
                self.metrics.request_coalesced();
                match rx.recv().await {
                    Ok(Ok(bytes)) => Ok(TilePayload::new(bytes, PayloadSource::Coalesced)),
                    Ok(Err(shared)) => Err(TileServiceError::Coalesced(shared)),
                    Err(_) => {
                        debug!(key = %fingerprint, "In-flight request abandoned, computing");
                        self.compute_and_store(request, &fingerprint, cache_usable)
                            .await
                            .map(|bytes| TilePayload::new(bytes, PayloadSource::Computed))
                    }
                }
            }
        }
    }

    async fn compute_and_store(
        &self,
        request: &TileRequest,
        fingerprint: &TileFingerprint,
        cache_usable: bool,
    ) -> Result<Bytes, TileServiceError> {
        let bytes = self.compute(request).await?;
        if cache_usable {
            // Detached: the write outlives a cancelled request.
            drop(self.cache.spawn_write_back(fingerprint, bytes.clone()));
        }
        Ok(bytes)
    }

    /// Compute a tile from the spatial store, bypassing the cache.
    pub async fn compute(&self, request: &TileRequest) -> Result<Bytes, TileServiceError> {
        let started = Instant::now();
        let query = TileQuery::new(request, self.config.extent, self.config.buffer);

        let rows = self.store.fetch_tile_rows(&query).await?;
        let resolved = temporal::resolve(rows, request.year());
        let features = resolved.feature_count();
        let bytes = Bytes::from(self.encoder.encode(request.model_run(), &resolved)?);

        let elapsed = started.elapsed();
        self.metrics.tile_computed(elapsed, bytes.is_empty());
        let (lat, lon) = tile_to_lat_lon(&request.coord());
        debug!(
            lat,
            lon,
            features,
            sites = resolved.sites.len(),
            observations = resolved.observations.len(),
            regions = resolved.regions.len(),
            size_bytes = bytes.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Computed tile"
        );
        Ok(bytes)
    }
}

impl std::fmt::Debug for TileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileService")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCacheProvider, NullCacheProvider};
    use crate::model::{DisplayAttributes, SiteFeature, TileRows};
    use crate::store::StoreError;
    use crate::tile::{ErrorKind, ModelRunId};
    use chrono::{DateTime, TimeZone, Utc};
    use futures::future::BoxFuture;
    use geo_types::{polygon, Geometry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Store returning a fixed set of rows, counting tile queries.
    struct CountingStore {
        modified: Mutex<Option<DateTime<Utc>>>,
        rows: TileRows,
        fetches: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingStore {
        fn new(rows: TileRows) -> Self {
            Self {
                modified: Mutex::new(Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())),
                rows,
                fetches: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl SpatialStore for CountingStore {
        fn latest_modification<'a>(
            &'a self,
            _model_run: &'a ModelRunId,
        ) -> BoxFuture<'a, Result<Option<DateTime<Utc>>, StoreError>> {
            let modified = *self.modified.lock().unwrap();
            Box::pin(async move { Ok(modified) })
        }

        fn fetch_tile_rows<'a>(
            &'a self,
            _query: &'a TileQuery,
        ) -> BoxFuture<'a, Result<TileRows, StoreError>> {
            Box::pin(async move {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                if self.fail {
                    return Err(StoreError::Unavailable("connection reset".to_string()));
                }
                Ok(self.rows.clone())
            })
        }
    }

    fn one_site() -> TileRows {
        TileRows {
            sites: vec![SiteFeature {
                id: 1,
                label: "positive".to_string(),
                status: None,
                score: None,
                version: None,
                display: DisplayAttributes::default(),
                timemin: None,
                timemax: None,
                has_no_observations: true,
                geometry: Geometry::Polygon(polygon![
                    (x: 10.0, y: 10.0),
                    (x: 100.0, y: 10.0),
                    (x: 100.0, y: 100.0),
                    (x: 10.0, y: 100.0),
                ]),
            }],
            ..Default::default()
        }
    }

    fn request() -> TileRequest {
        TileRequest::parse("M1", "10", "511", "511", "2021", None).unwrap()
    }

    fn service(store: Arc<CountingStore>) -> TileService {
        TileService::new(
            store,
            Arc::new(MemoryCacheProvider::new(1_000_000)),
            TileServiceConfig::default(),
        )
    }

    async fn settle() {
        // Let spawned write-backs run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(CountingStore::new(one_site()));
        let service = service(Arc::clone(&store));

        let first = service.get_tile(&request()).await.unwrap();
        assert_eq!(first.source(), PayloadSource::Computed);
        assert!(!first.is_empty());
        settle().await;

        let second = service.get_tile(&request()).await.unwrap();
        assert_eq!(second.source(), PayloadSource::Cache);
        assert_eq!(first.bytes(), second.bytes());
        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test]
    async fn test_modification_moves_key() {
        let store = Arc::new(CountingStore::new(one_site()));
        let service = service(Arc::clone(&store));

        service.get_tile(&request()).await.unwrap();
        settle().await;

        *store.modified.lock().unwrap() = Some(Utc.timestamp_opt(1_700_000_100, 0).unwrap());
        let payload = service.get_tile(&request()).await.unwrap();
        assert_eq!(payload.source(), PayloadSource::Computed);
        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test]
    async fn test_empty_tile_is_success() {
        let store = Arc::new(CountingStore::new(TileRows::default()));
        let service = service(store);

        let payload = service.get_tile(&request()).await.unwrap();
        assert!(payload.is_empty());
        assert_eq!(service.snapshot().empty_tiles, 1);
    }

    #[tokio::test]
    async fn test_unknown_model_run_is_invalid_request() {
        let store = Arc::new(CountingStore::new(one_site()));
        *store.modified.lock().unwrap() = None;
        let service = service(Arc::clone(&store));

        let err = service.get_tile(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(store.fetches(), 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_counts_no_write_backs() {
        let store = Arc::new(CountingStore::new(one_site()));
        let service = TileService::new(
            Arc::clone(&store) as Arc<dyn SpatialStore>,
            Arc::new(NullCacheProvider),
            TileServiceConfig::default(),
        );

        service.get_tile(&request()).await.unwrap();
        service.get_tile(&request()).await.unwrap();
        settle().await;

        let snapshot = service.snapshot();
        assert_eq!(store.fetches(), 2);
        assert_eq!(snapshot.tiles_computed, 2);
        assert_eq!(snapshot.write_backs, 0);
        assert_eq!(snapshot.write_back_failures, 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates_and_is_not_cached() {
        let mut store = CountingStore::new(one_site());
        store.fail = true;
        let store = Arc::new(store);
        let service = service(Arc::clone(&store));

        let err = service.get_tile(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamQueryFailure);
        settle().await;

        assert!(service.get_tile(&request()).await.is_err());
        assert_eq!(store.fetches(), 2);
        assert_eq!(service.snapshot().write_backs, 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_compute_once() {
        let mut store = CountingStore::new(one_site());
        store.delay = Duration::from_millis(50);
        let store = Arc::new(store);
        let service = Arc::new(service(Arc::clone(&store)));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.get_tile(&request()).await.unwrap() })
            })
            .collect();

        let mut payloads = Vec::new();
        for task in tasks {
            payloads.push(task.await.unwrap());
        }

        assert_eq!(store.fetches(), 1);
        assert!(payloads.windows(2).all(|w| w[0].bytes() == w[1].bytes()));
        assert_eq!(service.snapshot().coalesced_requests, 7);
    }

    #[tokio::test]
    async fn test_coalescing_disabled_computes_each() {
        let mut store = CountingStore::new(one_site());
        store.delay = Duration::from_millis(50);
        let store = Arc::new(store);
        let config = TileServiceConfig {
            coalesce: false,
            ..Default::default()
        };
        let service = Arc::new(TileService::new(
            Arc::clone(&store) as Arc<dyn SpatialStore>,
            Arc::new(MemoryCacheProvider::new(1_000_000)),
            config,
        ));

        let a = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.get_tile(&request()).await })
        };
        let b = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.get_tile(&request()).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(store.fetches(), 2);
    }
}
