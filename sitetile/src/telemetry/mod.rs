//! Tile service telemetry.
//!
//! Lock-free atomic counters updated on the request path, plus point-in-time
//! snapshots for the stats endpoint and shutdown summary.
//!
//! # Architecture
//!
//! ```text
//! TileService / TileCacheClient ─────► TileMetrics ─────► TelemetrySnapshot ─────► /stats, logs
//!                                      (atomic counters)  (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```
//! use sitetile::telemetry::TileMetrics;
//!
//! let metrics = TileMetrics::new();
//! metrics.cache_hit();
//! metrics.cache_miss();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.cache_hits, 1);
//! assert_eq!(snapshot.hit_rate(), 0.5);
//! ```

mod metrics;
mod snapshot;

pub use metrics::TileMetrics;
pub use snapshot::TelemetrySnapshot;
