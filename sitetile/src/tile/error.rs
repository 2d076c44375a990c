//! Error types for tile service operations.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::ServiceCacheError;
use crate::coord::CoordError;
use crate::encode::EncodeError;
use crate::store::StoreError;
use crate::tile::ModelRunId;

/// Coarse classification of a tile failure, used by the calling boundary to
/// choose a response (client error, server error, or nothing at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed parameters or an unknown model run. Never retried.
    InvalidRequest,
    /// The spatial store is unreachable or a query failed.
    UpstreamQueryFailure,
    /// The cache store is unreachable. Absorbed by the facade.
    CacheUnavailable,
    /// Geometry could not be serialized into a tile.
    EncodingFailure,
}

impl ErrorKind {
    /// Whether the failure is the caller's fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::InvalidRequest)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::UpstreamQueryFailure => "upstream_query_failure",
            ErrorKind::CacheUnavailable => "cache_unavailable",
            ErrorKind::EncodingFailure => "encoding_failure",
        };
        f.write_str(name)
    }
}

/// Errors returned by the tile service.
#[derive(Debug, Error)]
pub enum TileServiceError {
    /// A request parameter failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The model run does not exist in the spatial store.
    #[error("unknown model run: {0}")]
    UnknownModelRun(ModelRunId),

    /// The spatial store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The cache store failed.
    #[error(transparent)]
    Cache(#[from] ServiceCacheError),

    /// Tile encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodeError),

    /// The failure of an identical in-flight request this one waited on.
    #[error(transparent)]
    Coalesced(Arc<TileServiceError>),
}

impl TileServiceError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TileServiceError::InvalidRequest(_) | TileServiceError::UnknownModelRun(_) => {
                ErrorKind::InvalidRequest
            }
            TileServiceError::Store(e) if e.is_malformed_geometry() => ErrorKind::EncodingFailure,
            TileServiceError::Store(_) => ErrorKind::UpstreamQueryFailure,
            TileServiceError::Cache(_) => ErrorKind::CacheUnavailable,
            TileServiceError::Encoding(_) => ErrorKind::EncodingFailure,
            TileServiceError::Coalesced(inner) => inner.kind(),
        }
    }
}

impl From<CoordError> for TileServiceError {
    fn from(e: CoordError) -> Self {
        TileServiceError::InvalidRequest(e.to_string())
    }
}
