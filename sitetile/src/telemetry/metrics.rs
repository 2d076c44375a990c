//! Atomic counters for the tile service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::snapshot::TelemetrySnapshot;

/// Counters recorded while serving tiles.
///
/// All methods take `&self` and use relaxed atomics; share the struct
/// through an `Arc`.
#[derive(Debug)]
pub struct TileMetrics {
    started: Instant,
    requests: AtomicU64,
    request_failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
    tiles_computed: AtomicU64,
    empty_tiles: AtomicU64,
    coalesced_requests: AtomicU64,
    write_backs: AtomicU64,
    write_back_failures: AtomicU64,
    bytes_served: AtomicU64,
    compute_micros: AtomicU64,
}

impl Default for TileMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TileMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            request_failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_errors: AtomicU64::new(0),
            tiles_computed: AtomicU64::new(0),
            empty_tiles: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            write_backs: AtomicU64::new(0),
            write_back_failures: AtomicU64::new(0),
            bytes_served: AtomicU64::new(0),
            compute_micros: AtomicU64::new(0),
        }
    }

    pub fn request_started(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_failed(&self) {
        self.request_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a payload returned to a caller.
    pub fn bytes_served(&self, bytes: usize) {
        self.bytes_served.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A cache read or write failed and was absorbed.
    pub fn cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile was computed from the spatial store.
    pub fn tile_computed(&self, elapsed: Duration, empty: bool) {
        self.tiles_computed.fetch_add(1, Ordering::Relaxed);
        self.compute_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if empty {
            self.empty_tiles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A request was served by waiting on an identical in-flight one.
    pub fn request_coalesced(&self) {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_back_completed(&self) {
        self.write_backs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_back_failed(&self) {
        self.write_back_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime: self.started.elapsed(),
            requests: self.requests.load(Ordering::Relaxed),
            request_failures: self.request_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            tiles_computed: self.tiles_computed.load(Ordering::Relaxed),
            empty_tiles: self.empty_tiles.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
            write_back_failures: self.write_back_failures.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
            compute_time: Duration::from_micros(self.compute_micros.load(Ordering::Relaxed)),
        }
    }
}
