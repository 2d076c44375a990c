//! Tile coordinate types and validation.

use std::fmt;

use thiserror::Error;

/// Minimum supported zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum supported zoom level.
///
/// Matches the deepest zoom a PostGIS `ST_TileEnvelope` call accepts without
/// losing precision in the 3857 envelope.
pub const MAX_ZOOM: u8 = 24;

/// Half the circumference of the Web Mercator world, in meters.
pub const MERCATOR_HALF_EXTENT: f64 = 20_037_508.342_789_244;

/// Errors produced when validating tile coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Zoom level outside `MIN_ZOOM..=MAX_ZOOM`.
    #[error("invalid zoom level {0} (max {MAX_ZOOM})")]
    InvalidZoom(u8),

    /// Column index outside the tile grid for the zoom level.
    #[error("tile x {x} out of range for zoom {zoom}")]
    InvalidX { x: u32, zoom: u8 },

    /// Row index outside the tile grid for the zoom level.
    #[error("tile y {y} out of range for zoom {zoom}")]
    InvalidY { y: u32, zoom: u8 },
}

/// A validated tile coordinate in the XYZ (slippy map) scheme.
///
/// `x` increases eastward and `y` increases southward. Construction through
/// [`TileCoord::new`] guarantees both indices fit the grid at `zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Create a tile coordinate, validating it against the grid size.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let n = Self::grid_size(zoom);
        if u64::from(x) >= n {
            return Err(CoordError::InvalidX { x, zoom });
        }
        if u64::from(y) >= n {
            return Err(CoordError::InvalidY { y, zoom });
        }
        Ok(Self { zoom, x, y })
    }

    /// Number of tiles along one axis at the given zoom.
    #[inline]
    pub fn grid_size(zoom: u8) -> u64 {
        1u64 << zoom
    }

    /// Web Mercator (EPSG:3857) envelope covered by this tile.
    pub fn mercator_bounds(&self) -> MercatorBounds {
        let size = 2.0 * MERCATOR_HALF_EXTENT / Self::grid_size(self.zoom) as f64;
        let min_x = -MERCATOR_HALF_EXTENT + f64::from(self.x) * size;
        let max_y = MERCATOR_HALF_EXTENT - f64::from(self.y) * size;
        MercatorBounds {
            min_x,
            min_y: max_y - size,
            max_x: min_x + size,
            max_y,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Axis-aligned envelope in Web Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl MercatorBounds {
    /// Width of the envelope in meters.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Whether the point lies inside the envelope (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}
