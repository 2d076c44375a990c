//! Point-in-time view of the tile counters.

use std::fmt;
use std::time::Duration;

/// Copy of [`TileMetrics`](super::TileMetrics) at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub uptime: Duration,
    pub requests: u64,
    pub request_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub tiles_computed: u64,
    pub empty_tiles: u64,
    pub coalesced_requests: u64,
    pub write_backs: u64,
    pub write_back_failures: u64,
    pub bytes_served: u64,
    pub compute_time: Duration,
}

impl TelemetrySnapshot {
    /// Fraction of cache lookups that hit, `0.0` when there were none.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    /// Mean time spent computing one tile, in milliseconds.
    pub fn avg_compute_ms(&self) -> f64 {
        if self.tiles_computed == 0 {
            0.0
        } else {
            self.compute_time.as_secs_f64() * 1000.0 / self.tiles_computed as f64
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests ({} failed), hit rate {:.1}%, {} computed ({} empty, avg {:.1}ms), {} coalesced, {} written back",
            self.requests,
            self.request_failures,
            self.hit_rate() * 100.0,
            self.tiles_computed,
            self.empty_tiles,
            self.avg_compute_ms(),
            self.coalesced_requests,
            self.write_backs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_without_lookups() {
        assert_eq!(TelemetrySnapshot::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let snapshot = TelemetrySnapshot {
            cache_hits: 3,
            cache_misses: 1,
            ..Default::default()
        };
        assert_eq!(snapshot.hit_rate(), 0.75);
    }

    #[test]
    fn test_display_mentions_hit_rate() {
        let snapshot = TelemetrySnapshot {
            requests: 4,
            cache_hits: 1,
            cache_misses: 3,
            ..Default::default()
        };
        assert!(snapshot.to_string().contains("hit rate 25.0%"));
    }
}
