//! Spatial store access.
//!
//! The tile service reads the spatial database through the [`SpatialStore`]
//! trait, so tests can substitute an in-memory implementation:
//!
//! ```text
//! ┌──────────────┐  latest_modification  ┌─────────────────┐
//! │ TileService  │ ────────────────────► │  SpatialStore   │
//! │              │  fetch_tile_rows      │  (trait object) │
//! └──────────────┘ ────────────────────► └────────┬────────┘
//!                                                 │
//!                                      ┌──────────┴──────────┐
//!                                      │   PgSpatialStore    │
//!                                      │ (sqlx + PostGIS)    │
//!                                      └─────────────────────┘
//! ```
//!
//! Queries are composed by [`TileQuery`], which binds the tile envelope, the
//! tile extent and the reference year as parameters. Geometries come back as
//! tile-local WKB and are decoded into `geo-types` values.

mod postgres;
mod query;
mod rows;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use thiserror::Error;

use crate::model::TileRows;
use crate::tile::ModelRunId;

pub use postgres::{create_pool, mask_password, PgSpatialStore, PgStoreConfig};
pub use query::{latest_modification_query, QueryParam, SpatialQuery, TileQuery, DEFAULT_BUFFER};

/// Errors raised by the spatial store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query failed or the database could not be reached.
    #[error("spatial query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The store is not available.
    #[error("spatial store unavailable: {0}")]
    Unavailable(String),

    /// A returned geometry could not be decoded.
    #[error("malformed geometry in {layer} row {id}: {reason}")]
    MalformedGeometry {
        layer: &'static str,
        id: i64,
        reason: String,
    },
}

impl StoreError {
    /// Whether the failure concerns geometry content rather than the store.
    pub fn is_malformed_geometry(&self) -> bool {
        matches!(self, StoreError::MalformedGeometry { .. })
    }
}

/// Read access to the spatial data behind the tiles.
///
/// Both operations are read-only. Implementations must be safe for
/// concurrent use.
pub trait SpatialStore: Send + Sync {
    /// Latest modification time visible for a model run.
    ///
    /// This is the greater of the newest site evaluation modification and
    /// the model run's own creation time. Returns `None` when the model run
    /// does not exist.
    fn latest_modification<'a>(
        &'a self,
        model_run: &'a ModelRunId,
    ) -> BoxFuture<'a, Result<Option<DateTime<Utc>>, StoreError>>;

    /// Fetch the site, observation and region rows intersecting a tile.
    fn fetch_tile_rows<'a>(
        &'a self,
        query: &'a TileQuery,
    ) -> BoxFuture<'a, Result<TileRows, StoreError>>;
}
