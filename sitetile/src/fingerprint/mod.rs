//! Freshness fingerprints.
//!
//! Cached tiles are never invalidated explicitly. Instead the cache key
//! embeds the latest modification time visible for the model run, so any
//! upstream edit moves subsequent requests onto a new key and the stale
//! entry simply ages out.
//!
//! # Key Format
//!
//! ```text
//! {namespace}:{model_run}:{z}:{x}:{y}:{modified_micros}:{year}[:session-{digest}]
//! ```
//!
//! The session suffix is a separate field of [`TileFingerprint`]. The
//! published key is produced by leaving that field out, never by editing
//! the lookup key string.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::coord::TileCoord;
use crate::store::SpatialStore;
use crate::tile::{ModelRunId, ReferenceYear, TileRequest, TileServiceError};

/// Default namespace tag for tile keys.
pub const DEFAULT_NAMESPACE: &str = "vector-tile";

/// Everything that identifies one cached tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileFingerprint {
    namespace: String,
    model_run: ModelRunId,
    coord: TileCoord,
    year: ReferenceYear,
    modified: DateTime<Utc>,
    session_digest: Option<String>,
}

impl TileFingerprint {
    /// Build a fingerprint for a request and a freshness timestamp.
    pub fn new(namespace: &str, request: &TileRequest, modified: DateTime<Utc>) -> Self {
        Self {
            namespace: namespace.to_string(),
            model_run: request.model_run().clone(),
            coord: request.coord(),
            year: request.year(),
            modified,
            session_digest: request.session().map(|s| s.digest()),
        }
    }

    /// Freshness timestamp embedded in the key.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Whether the key is scoped to an edit session.
    pub fn is_session(&self) -> bool {
        self.session_digest.is_some()
    }

    /// Key used to look the tile up.
    pub fn lookup_key(&self) -> String {
        let base = self.published_key();
        match self.session_digest {
            Some(ref digest) => format!("{}:session-{}", base, digest),
            None => base,
        }
    }

    /// Key that write-back populates; never carries a session suffix.
    pub fn published_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.namespace,
            self.model_run,
            self.coord.zoom,
            self.coord.x,
            self.coord.y,
            self.modified.timestamp_micros(),
            self.year.value()
        )
    }
}

impl fmt::Display for TileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lookup_key())
    }
}

/// Derives fingerprints by asking the spatial store for the freshness time.
#[derive(Clone)]
pub struct FingerprintDeriver {
    store: Arc<dyn SpatialStore>,
    namespace: String,
}

impl FingerprintDeriver {
    pub fn new(store: Arc<dyn SpatialStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derive the fingerprint for a request.
    ///
    /// Runs one aggregate query on every call, cache hit or not, since the
    /// key itself depends on the result.
    ///
    /// # Errors
    ///
    /// Returns [`TileServiceError::UnknownModelRun`] when the model run does
    /// not exist, or a store error when the query fails.
    #[instrument(skip(self, request), fields(model_run = %request.model_run()))]
    pub async fn derive(&self, request: &TileRequest) -> Result<TileFingerprint, TileServiceError> {
        let modified = self
            .store
            .latest_modification(request.model_run())
            .await?
            .ok_or_else(|| TileServiceError::UnknownModelRun(request.model_run().clone()))?;

        let fingerprint = TileFingerprint::new(&self.namespace, request, modified);
        debug!(key = %fingerprint, "Derived tile fingerprint");
        Ok(fingerprint)
    }
}

impl fmt::Debug for FingerprintDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintDeriver")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
