//! Conversion of tile-local `geo_types` geometries into MVT command streams.

use geo_types::{Coord, Geometry, LineString, Polygon};
use mvt::{GeomData, GeomEncoder, GeomType};

/// Why a geometry could not be turned into MVT commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GeometryIssue {
    /// The geometry kind has no MVT counterpart.
    Unsupported(&'static str),
    /// The geometry is structurally invalid (empty, degenerate ring, ...).
    Malformed(String),
}

/// Encode a tile-local geometry.
///
/// Coordinates are rounded to the integer tile grid. Ring winding is kept as
/// produced by the spatial store, which already emits MVT-conformant rings.
pub(crate) fn encode_geometry(geometry: &Geometry<f64>) -> Result<GeomData, GeometryIssue> {
    match geometry {
        Geometry::Point(p) => encode_points(std::iter::once(p.0)),
        Geometry::MultiPoint(mp) => {
            if mp.0.is_empty() {
                return Err(GeometryIssue::Malformed("empty multipoint".to_string()));
            }
            encode_points(mp.0.iter().map(|p| p.0))
        }
        Geometry::Line(line) => encode_lines(&[LineString::new(vec![line.start, line.end])]),
        Geometry::LineString(ls) => encode_lines(std::slice::from_ref(ls)),
        Geometry::MultiLineString(mls) => encode_lines(&mls.0),
        Geometry::Polygon(poly) => encode_polygons(std::slice::from_ref(poly)),
        Geometry::MultiPolygon(mp) => encode_polygons(&mp.0),
        Geometry::Rect(rect) => encode_polygons(&[rect.to_polygon()]),
        Geometry::Triangle(tri) => encode_polygons(&[tri.to_polygon()]),
        Geometry::GeometryCollection(_) => Err(GeometryIssue::Unsupported("GeometryCollection")),
    }
}

fn mvt_err(e: mvt::Error) -> GeometryIssue {
    GeometryIssue::Malformed(e.to_string())
}

fn encode_points(points: impl Iterator<Item = Coord<f64>>) -> Result<GeomData, GeometryIssue> {
    let mut encoder = GeomEncoder::new(GeomType::Point);
    for c in points {
        ensure_finite(c)?;
        encoder = encoder.point(c.x.round(), c.y.round()).map_err(mvt_err)?;
    }
    encoder.encode().map_err(mvt_err)
}

fn encode_lines(lines: &[LineString<f64>]) -> Result<GeomData, GeometryIssue> {
    let mut encoder = GeomEncoder::new(GeomType::Linestring);
    let mut written = 0;
    for line in lines {
        let coords = rounded(line.0.iter().copied())?;
        if coords.len() < 2 {
            continue;
        }
        for c in &coords {
            encoder = encoder.point(c.x, c.y).map_err(mvt_err)?;
        }
        encoder = encoder.complete().map_err(mvt_err)?;
        written += 1;
    }
    if written == 0 {
        return Err(GeometryIssue::Malformed(
            "linestring has fewer than two distinct points".to_string(),
        ));
    }
    encoder.encode().map_err(mvt_err)
}

fn encode_polygons(polygons: &[Polygon<f64>]) -> Result<GeomData, GeometryIssue> {
    let mut encoder = GeomEncoder::new(GeomType::Polygon);
    let mut written = 0;
    for poly in polygons {
        let exterior = ring_coords(poly.exterior())?;
        if exterior.len() < 3 {
            // Collapsed to a sliver at this zoom; the other parts may survive
            continue;
        }
        for c in &exterior {
            encoder = encoder.point(c.x, c.y).map_err(mvt_err)?;
        }
        encoder = encoder.complete().map_err(mvt_err)?;
        written += 1;

        for interior in poly.interiors() {
            let ring = ring_coords(interior)?;
            if ring.len() < 3 {
                continue;
            }
            for c in &ring {
                encoder = encoder.point(c.x, c.y).map_err(mvt_err)?;
            }
            encoder = encoder.complete().map_err(mvt_err)?;
        }
    }
    if written == 0 {
        return Err(GeometryIssue::Malformed(
            "polygon has no ring with three or more points".to_string(),
        ));
    }
    encoder.encode().map_err(mvt_err)
}

/// Rounded ring coordinates without the closing point and without repeats.
fn ring_coords(ring: &LineString<f64>) -> Result<Vec<Coord<f64>>, GeometryIssue> {
    let mut coords = rounded(ring.0.iter().copied())?;
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    Ok(coords)
}

fn rounded(coords: impl Iterator<Item = Coord<f64>>) -> Result<Vec<Coord<f64>>, GeometryIssue> {
    let mut out: Vec<Coord<f64>> = Vec::new();
    for c in coords {
        ensure_finite(c)?;
        let c = Coord {
            x: c.x.round(),
            y: c.y.round(),
        };
        if out.last() != Some(&c) {
            out.push(c);
        }
    }
    Ok(out)
}

fn ensure_finite(c: Coord<f64>) -> Result<(), GeometryIssue> {
    if c.x.is_finite() && c.y.is_finite() {
        Ok(())
    } else {
        Err(GeometryIssue::Malformed(format!(
            "non-finite coordinate ({}, {})",
            c.x, c.y
        )))
    }
}
