//! Tile payloads returned by the service.

use bytes::Bytes;

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// Served from the cache.
    Cache,
    /// Computed for this request.
    Computed,
    /// Computed by an identical concurrent request.
    Coalesced,
}

/// Encoded tile bytes.
///
/// A zero-length payload means "no features in this tile" and should be
/// reported as no content, not as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePayload {
    bytes: Bytes,
    source: PayloadSource,
}

impl TilePayload {
    pub fn new(bytes: Bytes, source: PayloadSource) -> Self {
        Self { bytes, source }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn source(&self) -> PayloadSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
