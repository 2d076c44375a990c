//! Vector tile encoding.
//!
//! Serializes resolved row-sets into a Mapbox Vector Tile payload with one
//! named layer per row-set:
//!
//! - `sites-<modelRunId>`
//! - `observations-<modelRunId>`
//! - `regions-<modelRunId>`
//!
//! Each non-empty layer is encoded on its own and the per-layer encodings
//! are concatenated. Concatenated MVT messages form a valid multi-layer tile,
//! and a tile with no features at all is a zero-length payload.
//!
//! The encoder never interprets attributes: a record's [`LayerFeature`]
//! implementation decides what is exposed.

mod geometry;

use mvt::Tile;
use thiserror::Error;
use tracing::trace;

use crate::model::{ResolvedTile, TileGeometry};
use crate::tile::ModelRunId;

use geometry::{encode_geometry, GeometryIssue};

/// Default tile extent (tile-local coordinate range).
pub const DEFAULT_EXTENT: u32 = 4096;

/// Errors that can occur while encoding a tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A feature's geometry could not be serialized.
    #[error("malformed geometry for feature {id} in layer {layer}: {reason}")]
    MalformedGeometry {
        layer: String,
        id: u64,
        reason: String,
    },

    /// A feature's geometry kind has no vector tile representation.
    #[error("unsupported geometry {kind} for feature {id} in layer {layer}")]
    UnsupportedGeometry {
        layer: String,
        id: u64,
        kind: &'static str,
    },

    /// The MVT writer rejected the layer.
    #[error("failed to write layer {layer}: {reason}")]
    Write { layer: String, reason: String },
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

/// A record that can be written as one feature of a vector tile layer.
pub trait LayerFeature {
    /// Feature id stored in the tile.
    fn id(&self) -> u64;

    /// Tile-local geometry.
    fn geometry(&self) -> &TileGeometry;

    /// Attribute set, in output order.
    fn properties(&self) -> Vec<(&'static str, PropertyValue)>;
}

/// Names of the three layers for one model run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerNames {
    pub sites: String,
    pub observations: String,
    pub regions: String,
}

impl LayerNames {
    /// Layer names for the given model run.
    pub fn for_model_run(model_run: &ModelRunId) -> Self {
        Self {
            sites: format!("sites-{}", model_run),
            observations: format!("observations-{}", model_run),
            regions: format!("regions-{}", model_run),
        }
    }
}

/// Encodes resolved row-sets into MVT bytes.
#[derive(Debug, Clone, Copy)]
pub struct TileEncoder {
    extent: u32,
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENT)
    }
}

impl TileEncoder {
    /// Create an encoder for the given tile extent.
    pub fn new(extent: u32) -> Self {
        Self { extent }
    }

    /// Tile extent written into each layer.
    pub fn extent(&self) -> u32 {
        self.extent
    }

    /// Encode the three layers of a tile.
    ///
    /// Returns an empty vector when every row-set is empty. On error nothing
    /// is returned, so a partially written tile never escapes.
    pub fn encode(
        &self,
        model_run: &ModelRunId,
        tile: &ResolvedTile,
    ) -> Result<Vec<u8>, EncodeError> {
        let names = LayerNames::for_model_run(model_run);
        let mut payload = Vec::new();
        payload.extend(self.encode_layer(&names.sites, &tile.sites)?);
        payload.extend(self.encode_layer(&names.observations, &tile.observations)?);
        payload.extend(self.encode_layer(&names.regions, &tile.regions)?);
        Ok(payload)
    }

    /// Encode a single layer; an empty row-set yields no bytes.
    pub fn encode_layer<F: LayerFeature>(
        &self,
        name: &str,
        features: &[F],
    ) -> Result<Vec<u8>, EncodeError> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let mut tile = Tile::new(self.extent);
        let mut layer = tile.create_layer(name);

        for feature in features {
            let geom = encode_geometry(feature.geometry()).map_err(|issue| match issue {
                GeometryIssue::Unsupported(kind) => EncodeError::UnsupportedGeometry {
                    layer: name.to_string(),
                    id: feature.id(),
                    kind,
                },
                GeometryIssue::Malformed(reason) => EncodeError::MalformedGeometry {
                    layer: name.to_string(),
                    id: feature.id(),
                    reason,
                },
            })?;

            let mut mvt_feature = layer.into_feature(geom);
            mvt_feature.set_id(feature.id());
            for (key, value) in feature.properties() {
                match value {
                    PropertyValue::String(v) => mvt_feature.add_tag_string(key, &v),
                    PropertyValue::Int(v) => mvt_feature.add_tag_sint(key, v),
                    PropertyValue::Float(v) => mvt_feature.add_tag_double(key, v),
                    PropertyValue::Bool(v) => mvt_feature.add_tag_bool(key, v),
                }
            }
            layer = mvt_feature.into_layer();
        }

        let write_err = |e: mvt::Error| EncodeError::Write {
            layer: name.to_string(),
            reason: e.to_string(),
        };
        tile.add_layer(layer).map_err(write_err)?;
        let bytes = tile.to_bytes().map_err(write_err)?;

        trace!(
            layer = name,
            features = features.len(),
            size_bytes = bytes.len(),
            "Encoded layer"
        );
        Ok(bytes)
    }
}
