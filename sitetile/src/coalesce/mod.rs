//! Single-flight coalescing of identical tile requests.
//!
//! When several requests miss the cache for the same key at once, only the
//! first (the leader) computes the tile. The others subscribe to the
//! leader's outcome and return it, error included.
//!
//! ```text
//! request A ──► register(key) ──► NewRequest(InFlight) ──► compute ──► complete(outcome)
//!                                                                           │
//! request B ──► register(key) ──► Coalesced(rx) ──► rx.recv() ◄─────────────┘
//! ```
//!
//! The map is only touched inside `register` and when the leader finishes,
//! so no lock is held while the tile is being computed. If the leader is
//! dropped before completing (its request was cancelled), the entry is
//! removed and waiting followers see a closed channel; they then compute
//! the tile themselves.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::tile::TileServiceError;

/// Outcome shared between the leader and its followers.
pub type SharedOutcome = Result<Bytes, Arc<TileServiceError>>;

/// Result of registering a request.
pub enum CoalesceResult<'a> {
    /// No identical request is in flight; the caller must compute and then
    /// call [`InFlight::complete`].
    NewRequest(InFlight<'a>),
    /// An identical request is in flight; wait on the receiver.
    Coalesced(broadcast::Receiver<SharedOutcome>),
}

/// Tracks in-flight tile computations by cache key.
#[derive(Debug, Default)]
pub struct RequestCoalescer {
    in_flight: DashMap<String, broadcast::Sender<SharedOutcome>>,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `key`.
    pub fn register(&self, key: &str) -> CoalesceResult<'_> {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                trace!(key, "Joining in-flight tile request");
                CoalesceResult::Coalesced(entry.get().subscribe())
            }
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx);
                CoalesceResult::NewRequest(InFlight {
                    coalescer: self,
                    key: key.to_string(),
                    completed: false,
                })
            }
        }
    }

    /// Number of keys currently being computed.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn finish(&self, key: &str, outcome: Option<SharedOutcome>) {
        if let Some((_, tx)) = self.in_flight.remove(key) {
            if let Some(outcome) = outcome {
                // No receivers is fine: nobody joined this request.
                let _ = tx.send(outcome);
            }
        }
    }
}

/// Leadership of one in-flight computation.
///
/// Dropping it without calling [`complete`](Self::complete) releases the
/// key and wakes followers with a closed channel.
pub struct InFlight<'a> {
    coalescer: &'a RequestCoalescer,
    key: String,
    completed: bool,
}

impl InFlight<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Publish the outcome to every follower and release the key.
    pub fn complete(mut self, outcome: SharedOutcome) {
        self.completed = true;
        self.coalescer.finish(&self.key, Some(outcome));
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.completed {
            trace!(key = %self.key, "In-flight tile request abandoned");
            self.coalescer.finish(&self.key, None);
        }
    }
}
