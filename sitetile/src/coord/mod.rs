//! Coordinate module
//!
//! Provides validated XYZ tile coordinates and their conversion to the Web
//! Mercator envelope used to filter geometries in the spatial store.

mod types;

pub use types::{CoordError, MercatorBounds, TileCoord, MAX_ZOOM, MERCATOR_HALF_EXTENT, MIN_ZOOM};

use std::f64::consts::PI;

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = TileCoord::grid_size(tile.zoom) as f64;

    let lon = f64::from(tile.x) / n * 360.0 - 180.0;

    // Inverse Web Mercator for the row
    let y = f64::from(tile.y) / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}
