//! Integration tests for the tile service.
//!
//! These tests drive `TileService::get_tile` end to end over an in-memory
//! spatial store that answers the same questions as the PostGIS queries:
//! - envelope intersection per layer
//! - one observation row per observation, with its effective geometry for
//!   the reference year
//! - the latest modification time per model run
//!
//! Payloads are decoded with `mvt-reader` to count features per layer.
//!
//! Run with: `cargo test --test tile_service_integration`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use geo_types::{Geometry, Rect};

use sitetile::cache::{
    BoxFuture as CacheFuture, Cache, CacheService, ServiceCacheConfig, ServiceCacheError,
};
use sitetile::coord::{MercatorBounds, TileCoord};
use sitetile::model::{
    DisplayAttributes, ObservationCandidate, RegionFeature, SiteFeature, TileRows,
};
use sitetile::service::{PayloadSource, TileService, TileServiceConfig};
use sitetile::store::{SpatialStore, StoreError, TileQuery};
use sitetile::tile::{ErrorKind, ModelRunId, TileRequest};

// ============================================================================
// In-memory spatial store
// ============================================================================

struct FakeObservation {
    id: i64,
    year: i32,
    footprint: Rect<f64>,
}

struct FakeSite {
    id: i64,
    label: String,
    footprint: Rect<f64>,
    observations: Vec<FakeObservation>,
}

struct FakeRun {
    created: DateTime<Utc>,
    modified: Option<DateTime<Utc>>,
    sites: Vec<FakeSite>,
    region: Option<Rect<f64>>,
}

#[derive(Default)]
struct FakeStore {
    runs: Mutex<HashMap<String, FakeRun>>,
    fetches: AtomicUsize,
    /// Time each tile fetch takes.
    latency: Duration,
}

impl FakeStore {
    fn insert_run(&self, id: &str, run: FakeRun) {
        self.runs.lock().unwrap().insert(id.to_string(), run);
    }

    /// Relabel a site the way an annotator edit would, bumping the
    /// modification time.
    fn relabel_site(&self, run: &str, site: i64, label: &str, at: DateTime<Utc>) {
        let mut runs = self.runs.lock().unwrap();
        let run = runs.get_mut(run).unwrap();
        let site = run.sites.iter_mut().find(|s| s.id == site).unwrap();
        site.label = label.to_string();
        run.modified = Some(at);
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn rows(&self, query: &TileQuery) -> TileRows {
        let runs = self.runs.lock().unwrap();
        let Some(run) = runs.get(query.model_run().as_str()) else {
            return TileRows::default();
        };
        let bounds = query.bounds();
        let extent = f64::from(query.extent());
        let year = query.year().value();
        let display = DisplayAttributes {
            performer_name: "KIT".to_string(),
            region_name: Some("KR_R001".to_string()),
            configuration_name: query.model_run().to_string(),
            groundtruth: false,
        };

        let mut rows = TileRows::default();

        for site in &run.sites {
            if let Some(geometry) = to_tile(&site.footprint, &bounds, extent) {
                rows.sites.push(SiteFeature {
                    id: site.id,
                    label: site.label.clone(),
                    status: None,
                    score: Some(0.9),
                    version: None,
                    display: display.clone(),
                    timemin: None,
                    timemax: None,
                    has_no_observations: site.observations.is_empty(),
                    geometry,
                });
            }

            // Latest observation from a year before the reference year.
            let prior = site
                .observations
                .iter()
                .filter(|o| o.year < year)
                .max_by_key(|o| o.year);

            for observation in &site.observations {
                let (own, carried) = if observation.year == year {
                    (to_tile(&observation.footprint, &bounds, extent), None)
                } else {
                    let carried = prior.and_then(|p| to_tile(&p.footprint, &bounds, extent));
                    (None, carried)
                };
                if own.is_none() && carried.is_none() {
                    continue;
                }
                let next = site
                    .observations
                    .iter()
                    .filter(|o| o.year > observation.year)
                    .map(|o| year_start(o.year))
                    .min();
                rows.observations.push(ObservationCandidate {
                    id: observation.id,
                    site_id: site.id,
                    label: site.label.clone(),
                    score: None,
                    area: None,
                    observed_year: observation.year,
                    has_prior: prior.is_some(),
                    own_geometry: own,
                    prior_geometry: carried,
                    display: display.clone(),
                    timemin: Some(year_start(observation.year)),
                    timemax: next,
                });
            }
        }

        if let Some(region) = run.region {
            if let Some(geometry) = to_tile(&region, &bounds, extent) {
                rows.regions.push(RegionFeature {
                    id: 1,
                    name: "KR_R001".to_string(),
                    geometry,
                });
            }
        }
        rows
    }
}

impl SpatialStore for FakeStore {
    fn latest_modification<'a>(
        &'a self,
        model_run: &'a ModelRunId,
    ) -> BoxFuture<'a, Result<Option<DateTime<Utc>>, StoreError>> {
        Box::pin(async move {
            let runs = self.runs.lock().unwrap();
            Ok(runs
                .get(model_run.as_str())
                .map(|run| run.modified.map_or(run.created, |m| m.max(run.created))))
        })
    }

    fn fetch_tile_rows<'a>(
        &'a self,
        query: &'a TileQuery,
    ) -> BoxFuture<'a, Result<TileRows, StoreError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(self.rows(query))
        })
    }
}

/// Map a Mercator rectangle into tile-local space, `None` when it misses.
fn to_tile(rect: &Rect<f64>, bounds: &MercatorBounds, extent: f64) -> Option<Geometry<f64>> {
    let (min, max) = (rect.min(), rect.max());
    if max.x < bounds.min_x || min.x > bounds.max_x || max.y < bounds.min_y || min.y > bounds.max_y
    {
        return None;
    }
    let scale = extent / bounds.width();
    let local = Rect::new(
        ((min.x - bounds.min_x) * scale, (bounds.max_y - max.y) * scale),
        ((max.x - bounds.min_x) * scale, (bounds.max_y - min.y) * scale),
    );
    Some(Geometry::Polygon(local.to_polygon()))
}

fn year_start(year: i32) -> i64 {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap().timestamp()
}

// ============================================================================
// Failing cache
// ============================================================================

struct UnreachableCache {
    calls: AtomicUsize,
}

impl UnreachableCache {
    fn refused<T>(&self) -> Result<T, ServiceCacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ServiceCacheError::Unavailable("connection refused".to_string()))
    }
}

impl Cache for UnreachableCache {
    fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> CacheFuture<'_, Result<(), ServiceCacheError>> {
        let result = self.refused();
        Box::pin(async move { result })
    }

    fn get(&self, _key: &str) -> CacheFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        let result = self.refused();
        Box::pin(async move { result })
    }

    fn delete(&self, _key: &str) -> CacheFuture<'_, Result<bool, ServiceCacheError>> {
        let result = self.refused();
        Box::pin(async move { result })
    }

    fn contains(&self, _key: &str) -> CacheFuture<'_, Result<bool, ServiceCacheError>> {
        let result = self.refused();
        Box::pin(async move { result })
    }

    fn provider_name(&self) -> &'static str {
        "unreachable"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// A rectangle covering the middle half of a tile, in Mercator meters.
fn inside(z: u8, x: u32, y: u32) -> Rect<f64> {
    let b = TileCoord::new(z, x, y).unwrap().mercator_bounds();
    let quarter = b.width() / 4.0;
    Rect::new(
        (b.min_x + quarter, b.min_y + quarter),
        (b.max_x - quarter, b.max_y - quarter),
    )
}

fn created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// `M1`: one site inside tile (10, 511, 511), observed 2021-06-01.
fn m1_store() -> Arc<FakeStore> {
    m1_store_with_latency(Duration::ZERO)
}

fn m1_store_with_latency(latency: Duration) -> Arc<FakeStore> {
    let store = Arc::new(FakeStore {
        latency,
        ..FakeStore::default()
    });
    store.insert_run(
        "M1",
        FakeRun {
            created: created(),
            modified: None,
            sites: vec![FakeSite {
                id: 7,
                label: "positive_annotated".to_string(),
                footprint: inside(10, 511, 511),
                observations: vec![FakeObservation {
                    id: 70,
                    year: 2021,
                    footprint: inside(10, 511, 511),
                }],
            }],
            region: None,
        },
    );
    store
}

/// `M2`: one site with observations in 2019 and 2021 only.
fn sparse_store(footprint_2019: Rect<f64>, footprint_2021: Rect<f64>) -> Arc<FakeStore> {
    let store = Arc::new(FakeStore::default());
    store.insert_run(
        "M2",
        FakeRun {
            created: created(),
            modified: None,
            sites: vec![FakeSite {
                id: 9,
                label: "positive_pending".to_string(),
                footprint: inside(12, 2048, 1361),
                observations: vec![
                    FakeObservation {
                        id: 90,
                        year: 2019,
                        footprint: footprint_2019,
                    },
                    FakeObservation {
                        id: 91,
                        year: 2021,
                        footprint: footprint_2021,
                    },
                ],
            }],
            region: Some(inside(12, 2048, 1361)),
        },
    );
    store
}

async fn memory_service(store: Arc<FakeStore>) -> (TileService, Arc<dyn Cache>) {
    let cache_service = CacheService::start(ServiceCacheConfig::memory(10_000_000))
        .await
        .unwrap();
    let cache = cache_service.cache();
    let service = TileService::new(store, Arc::clone(&cache), TileServiceConfig::default());
    (service, cache)
}

fn request(model_run: &str, (z, x, y): (u8, u32, u32), year: i32) -> TileRequest {
    TileRequest::parse(
        model_run,
        &z.to_string(),
        &x.to_string(),
        &y.to_string(),
        &year.to_string(),
        None,
    )
    .unwrap()
}

fn with_session(request: &TileRequest, session: &str) -> TileRequest {
    TileRequest::parse(
        request.model_run().as_str(),
        &request.coord().zoom.to_string(),
        &request.coord().x.to_string(),
        &request.coord().y.to_string(),
        &request.year().to_string(),
        Some(session),
    )
    .unwrap()
}

/// Feature count per layer name.
fn layer_counts(bytes: &[u8]) -> HashMap<String, usize> {
    if bytes.is_empty() {
        return HashMap::new();
    }
    let reader = mvt_reader::Reader::new(bytes.to_vec()).unwrap();
    reader
        .get_layer_names()
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, reader.get_features(i).unwrap().len()))
        .collect()
}

fn count(counts: &HashMap<String, usize>, layer: &str) -> usize {
    counts.get(layer).copied().unwrap_or(0)
}

/// Wait for a fire-and-forget write-back to land.
async fn wait_for_key(cache: &Arc<dyn Cache>, key: &str) {
    for _ in 0..200 {
        if cache.contains(key).await.unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("key {} was never written", key);
}

const M1_TILE: (u8, u32, u32) = (10, 511, 511);
const M2_TILE: (u8, u32, u32) = (12, 2048, 1361);

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_m1_observation_layer_follows_reference_year() {
    let (service, _cache) = memory_service(m1_store()).await;

    let payload = service
        .get_tile(&request("M1", M1_TILE, 2021))
        .await
        .unwrap();
    let counts = layer_counts(payload.bytes());
    assert_eq!(count(&counts, "sites-M1"), 1);
    assert_eq!(count(&counts, "observations-M1"), 1);
    assert_eq!(count(&counts, "regions-M1"), 0);

    let payload = service
        .get_tile(&request("M1", M1_TILE, 2019))
        .await
        .unwrap();
    let counts = layer_counts(payload.bytes());
    assert_eq!(count(&counts, "sites-M1"), 1);
    assert_eq!(count(&counts, "observations-M1"), 0);
}

#[tokio::test]
async fn test_repeated_requests_are_byte_identical() {
    let store = m1_store();
    let (service, cache) = memory_service(Arc::clone(&store)).await;
    let req = request("M1", M1_TILE, 2021);

    let first = service.get_tile(&req).await.unwrap();
    assert_eq!(first.source(), PayloadSource::Computed);

    let key = service.fingerprint(&req).await.unwrap().published_key();
    wait_for_key(&cache, &key).await;

    let second = service.get_tile(&req).await.unwrap();
    assert_eq!(second.source(), PayloadSource::Cache);
    assert_eq!(first.bytes(), second.bytes());

    let recomputed = service.compute(&req).await.unwrap();
    assert_eq!(&recomputed, first.bytes());
}

#[tokio::test]
async fn test_edit_changes_key_and_is_not_masked_by_cache() {
    let store = m1_store();
    let (service, cache) = memory_service(Arc::clone(&store)).await;
    let req = request("M1", M1_TILE, 2021);

    let before = service.get_tile(&req).await.unwrap();
    let old_key = service.fingerprint(&req).await.unwrap().lookup_key();
    wait_for_key(&cache, &old_key).await;
    assert_eq!(store.fetch_count(), 1);

    store.relabel_site(
        "M1",
        7,
        "negative",
        Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap(),
    );

    let new_key = service.fingerprint(&req).await.unwrap().lookup_key();
    assert_ne!(old_key, new_key);

    let after = service.get_tile(&req).await.unwrap();
    assert_eq!(after.source(), PayloadSource::Computed);
    assert_eq!(store.fetch_count(), 2);
    assert_ne!(before.bytes(), after.bytes());
}

#[tokio::test]
async fn test_sparse_observations_fall_back_to_earlier_year() {
    let tile = inside(12, 2048, 1361);
    let (service, _cache) = memory_service(sparse_store(tile, tile)).await;

    for (year, expected) in [(2018, 0), (2019, 1), (2020, 2), (2021, 2), (2024, 2)] {
        let payload = service
            .get_tile(&request("M2", M2_TILE, year))
            .await
            .unwrap();
        let counts = layer_counts(payload.bytes());
        assert_eq!(
            count(&counts, "observations-M2"),
            expected,
            "observations for {}",
            year
        );
        assert_eq!(count(&counts, "sites-M2"), 1, "sites for {}", year);
        assert_eq!(count(&counts, "regions-M2"), 1, "regions for {}", year);
    }
}

#[tokio::test]
async fn test_carried_forward_geometry_decides_intersection() {
    // 2019 lies in the requested tile, 2021 lies far away.
    let (service, _cache) =
        memory_service(sparse_store(inside(12, 2048, 1361), inside(12, 10, 10))).await;

    // Both rows borrow the 2019 geometry in the gap year.
    let counts = layer_counts(
        service
            .get_tile(&request("M2", M2_TILE, 2020))
            .await
            .unwrap()
            .bytes(),
    );
    assert_eq!(count(&counts, "observations-M2"), 2);

    // Only the 2019 row remains; the 2021 row shows its own distant geometry.
    let counts = layer_counts(
        service
            .get_tile(&request("M2", M2_TILE, 2021))
            .await
            .unwrap()
            .bytes(),
    );
    assert_eq!(count(&counts, "observations-M2"), 1);

    // The reverse: the current-year geometry is inside, the carried one is not.
    let (service, _cache) =
        memory_service(sparse_store(inside(12, 10, 10), inside(12, 2048, 1361))).await;
    let counts = layer_counts(
        service
            .get_tile(&request("M2", M2_TILE, 2020))
            .await
            .unwrap()
            .bytes(),
    );
    assert_eq!(count(&counts, "observations-M2"), 0);

    let counts = layer_counts(
        service
            .get_tile(&request("M2", M2_TILE, 2021))
            .await
            .unwrap()
            .bytes(),
    );
    assert_eq!(count(&counts, "observations-M2"), 1);
}

#[tokio::test]
async fn test_tile_without_geometry_is_zero_length() {
    let (service, _cache) = memory_service(m1_store()).await;

    let payload = service
        .get_tile(&request("M1", (10, 0, 0), 2021))
        .await
        .unwrap();
    assert!(payload.is_empty());
    assert_eq!(payload.len(), 0);
}

#[tokio::test]
async fn test_session_requests_only_persist_published_key() {
    let store = m1_store();
    let (service, cache) = memory_service(Arc::clone(&store)).await;
    let published = request("M1", M1_TILE, 2021);
    let session = with_session(&published, "abc");

    let session_fp = service.fingerprint(&session).await.unwrap();
    let published_fp = service.fingerprint(&published).await.unwrap();
    assert_ne!(session_fp.lookup_key(), published_fp.lookup_key());
    assert_eq!(session_fp.published_key(), published_fp.lookup_key());

    let edited = service.get_tile(&session).await.unwrap();
    assert_eq!(edited.source(), PayloadSource::Computed);
    wait_for_key(&cache, &published_fp.lookup_key()).await;
    assert!(!cache.contains(&session_fp.lookup_key()).await.unwrap());

    // Viewers without the session benefit from the write-back.
    let viewer = service.get_tile(&published).await.unwrap();
    assert_eq!(viewer.source(), PayloadSource::Cache);
    assert_eq!(viewer.bytes(), edited.bytes());

    // The session key itself is never persisted, so the editor recomputes.
    let again = service.get_tile(&session).await.unwrap();
    assert_eq!(again.source(), PayloadSource::Computed);
    assert_eq!(store.fetch_count(), 2);
}

#[tokio::test]
async fn test_unreachable_cache_still_serves_correct_tiles() {
    let store = m1_store();
    let cache = Arc::new(UnreachableCache {
        calls: AtomicUsize::new(0),
    });
    let service = TileService::new(
        Arc::clone(&store) as Arc<dyn SpatialStore>,
        Arc::clone(&cache) as Arc<dyn Cache>,
        TileServiceConfig::default(),
    );
    let (reference, _cache) = memory_service(m1_store()).await;
    let req = request("M1", M1_TILE, 2021);
    let expected = reference.get_tile(&req).await.unwrap();

    for round in 1..=3 {
        let payload = service.get_tile(&req).await.unwrap();
        assert_eq!(payload.source(), PayloadSource::Computed);
        assert_eq!(payload.bytes(), expected.bytes());
        assert_eq!(store.fetch_count(), round);
    }

    // Lookups only: write-back is skipped while the cache is down.
    assert_eq!(cache.calls.load(Ordering::SeqCst), 3);
    let snapshot = service.snapshot();
    assert_eq!(snapshot.cache_errors, 3);
    assert_eq!(snapshot.write_backs, 0);
}

#[tokio::test]
async fn test_unknown_model_run_is_invalid_request() {
    let store = m1_store();
    let (service, _cache) = memory_service(Arc::clone(&store)).await;

    let err = service
        .get_tile(&request("M404", M1_TILE, 2021))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(store.fetch_count(), 0);
}

#[test]
fn test_malformed_parameters_are_rejected() {
    for (z, x, y, year) in [
        ("10", "1024", "0", "2021"),
        ("-1", "0", "0", "2021"),
        ("10", "0", "0", "twenty"),
        ("25", "0", "0", "2021"),
        ("10", "0", "0", "21"),
    ] {
        let err = TileRequest::parse("M1", z, x, y, year, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{}/{}/{} {}", z, x, y, year);
    }
    assert!(TileRequest::parse("M1; DROP TABLE", "1", "0", "0", "2021", None).is_err());
}

#[tokio::test]
async fn test_concurrent_misses_share_one_computation() {
    let store = m1_store_with_latency(Duration::from_millis(50));
    let (service, _cache) = memory_service(Arc::clone(&store)).await;
    let service = Arc::new(service);
    let req = request("M1", M1_TILE, 2021);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let req = req.clone();
            tokio::spawn(async move { service.get_tile(&req).await })
        })
        .collect();

    let mut payloads = Vec::new();
    for handle in handles {
        payloads.push(handle.await.unwrap().unwrap());
    }

    assert!(payloads.windows(2).all(|w| w[0].bytes() == w[1].bytes()));
    assert_eq!(store.fetch_count(), 1);
    let coalesced = payloads
        .iter()
        .filter(|p| p.source() == PayloadSource::Coalesced)
        .count();
    assert_eq!(coalesced, 7);
}
