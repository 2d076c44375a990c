//! Structured row records produced by the spatial query.
//!
//! Every row-set of a tile has an explicit record type so that attribute names
//! are checked at compile time rather than drifting inside ad hoc property
//! bags. Geometries are already in tile-local coordinates (clipped and
//! simplified by the spatial store).
//!
//! ```text
//! SpatialStore ──► TileRows ──► temporal::resolve ──► ResolvedTile ──► TileEncoder
//!                  (sites, observation candidates,    (sites, observation
//!                   regions)                           features, regions)
//! ```

use geo_types::Geometry;

use crate::encode::{LayerFeature, PropertyValue};

/// Geometry in tile-local integer space (`0..extent`, plus buffer).
pub type TileGeometry = Geometry<f64>;

/// Display attributes denormalized onto every site and observation row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplayAttributes {
    /// Short name of the performer that produced the model run.
    pub performer_name: String,
    /// Name of the region backing the model run.
    pub region_name: Option<String>,
    /// Title of the model run (its configuration name).
    pub configuration_name: String,
    /// Whether the performer is the ground truth source.
    pub groundtruth: bool,
}

impl DisplayAttributes {
    fn push_properties(&self, props: &mut Vec<(&'static str, PropertyValue)>) {
        props.push(("performer_name", self.performer_name.clone().into()));
        if let Some(ref region) = self.region_name {
            props.push(("region_name", region.clone().into()));
        }
        props.push(("configuration_name", self.configuration_name.clone().into()));
        props.push(("groundtruth", self.groundtruth.into()));
    }
}

/// One site evaluation intersecting the tile.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteFeature {
    pub id: i64,
    pub label: String,
    pub status: Option<String>,
    pub score: Option<f64>,
    pub version: Option<String>,
    pub display: DisplayAttributes,
    /// Start date as whole epoch seconds.
    pub timemin: Option<i64>,
    /// End date as whole epoch seconds.
    pub timemax: Option<i64>,
    /// True when the site has no observations in any year.
    pub has_no_observations: bool,
    pub geometry: TileGeometry,
}

/// An observation row before the reference-year rule is applied.
///
/// Both candidate geometries are tile-local and `None` when they miss the
/// tile envelope. `has_prior` records whether any observation of the same
/// site falls in a year before the reference year, independent of the tile.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationCandidate {
    pub id: i64,
    pub site_id: i64,
    pub label: String,
    pub score: Option<f64>,
    pub area: Option<f64>,
    /// Calendar year of the observation timestamp.
    pub observed_year: i32,
    pub has_prior: bool,
    pub own_geometry: Option<TileGeometry>,
    pub prior_geometry: Option<TileGeometry>,
    pub display: DisplayAttributes,
    /// Observation timestamp as whole epoch seconds.
    pub timemin: Option<i64>,
    /// Timestamp of the next observation of the same site (or the site end).
    pub timemax: Option<i64>,
}

/// An observation resolved against the reference year.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFeature {
    pub id: i64,
    pub site_id: i64,
    pub label: String,
    pub score: Option<f64>,
    pub area: Option<f64>,
    pub observed_year: i32,
    /// Whether `geometry` was carried forward from an earlier year.
    pub carried_forward: bool,
    pub display: DisplayAttributes,
    pub timemin: Option<i64>,
    pub timemax: Option<i64>,
    pub geometry: TileGeometry,
}

/// The region outline clipped to the tile.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    pub id: i64,
    pub name: String,
    pub geometry: TileGeometry,
}

/// Raw row-sets returned by the spatial store for one tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileRows {
    pub sites: Vec<SiteFeature>,
    pub observations: Vec<ObservationCandidate>,
    pub regions: Vec<RegionFeature>,
}

/// Row-sets ready for encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTile {
    pub sites: Vec<SiteFeature>,
    pub observations: Vec<ObservationFeature>,
    pub regions: Vec<RegionFeature>,
}

impl ResolvedTile {
    /// True when no layer has any feature.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty() && self.observations.is_empty() && self.regions.is_empty()
    }

    /// Total number of features across layers.
    pub fn feature_count(&self) -> usize {
        self.sites.len() + self.observations.len() + self.regions.len()
    }
}

fn push_time_bounds(
    props: &mut Vec<(&'static str, PropertyValue)>,
    timemin: Option<i64>,
    timemax: Option<i64>,
) {
    if let Some(t) = timemin {
        props.push(("timemin", t.into()));
    }
    if let Some(t) = timemax {
        props.push(("timemax", t.into()));
    }
}

impl LayerFeature for SiteFeature {
    fn id(&self) -> u64 {
        self.id as u64
    }

    fn geometry(&self) -> &TileGeometry {
        &self.geometry
    }

    fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        let mut props = vec![
            ("id", self.id.into()),
            ("label", self.label.clone().into()),
            ("has_no_observations", self.has_no_observations.into()),
        ];
        if let Some(ref status) = self.status {
            props.push(("status", status.clone().into()));
        }
        if let Some(score) = self.score {
            props.push(("score", score.into()));
        }
        if let Some(ref version) = self.version {
            props.push(("version", version.clone().into()));
        }
        self.display.push_properties(&mut props);
        push_time_bounds(&mut props, self.timemin, self.timemax);
        props
    }
}

impl LayerFeature for ObservationFeature {
    fn id(&self) -> u64 {
        self.id as u64
    }

    fn geometry(&self) -> &TileGeometry {
        &self.geometry
    }

    fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        let mut props = vec![
            ("id", self.id.into()),
            ("siteeval_id", self.site_id.into()),
            ("label", self.label.clone().into()),
            ("observed_year", i64::from(self.observed_year).into()),
            ("carried_forward", self.carried_forward.into()),
        ];
        if let Some(score) = self.score {
            props.push(("score", score.into()));
        }
        if let Some(area) = self.area {
            props.push(("area", area.into()));
        }
        self.display.push_properties(&mut props);
        push_time_bounds(&mut props, self.timemin, self.timemax);
        props
    }
}

impl LayerFeature for RegionFeature {
    fn id(&self) -> u64 {
        self.id as u64
    }

    fn geometry(&self) -> &TileGeometry {
        &self.geometry
    }

    fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![("id", self.id.into()), ("name", self.name.clone().into())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Point};

    fn display() -> DisplayAttributes {
        DisplayAttributes {
            performer_name: "KIT".to_string(),
            region_name: Some("KR_R001".to_string()),
            configuration_name: "run 7".to_string(),
            groundtruth: false,
        }
    }

    fn site() -> SiteFeature {
        SiteFeature {
            id: 42,
            label: "positive_annotated".to_string(),
            status: None,
            score: Some(0.75),
            version: None,
            display: display(),
            timemin: Some(1_600_000_000),
            timemax: None,
            has_no_observations: false,
            geometry: Geometry::Point(point!(x: 10.0, y: 20.0)),
        }
    }

    fn names(props: &[(&'static str, PropertyValue)]) -> Vec<&'static str> {
        props.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_site_properties_skip_missing_values() {
        let props = site().properties();
        let keys = names(&props);
        assert!(keys.contains(&"score"));
        assert!(keys.contains(&"timemin"));
        assert!(!keys.contains(&"status"));
        assert!(!keys.contains(&"timemax"));
        assert!(keys.contains(&"performer_name"));
        assert!(keys.contains(&"region_name"));
    }

    #[test]
    fn test_observation_properties_flag_carry_forward() {
        let feature = ObservationFeature {
            id: 9,
            site_id: 42,
            label: "active_construction".to_string(),
            score: None,
            area: Some(12.5),
            observed_year: 2021,
            carried_forward: true,
            display: display(),
            timemin: Some(1),
            timemax: Some(2),
            geometry: Geometry::Point(Point::new(0.0, 0.0)),
        };
        let props = feature.properties();
        assert!(props
            .iter()
            .any(|(k, v)| *k == "carried_forward" && *v == PropertyValue::Bool(true)));
        assert!(props
            .iter()
            .any(|(k, v)| *k == "siteeval_id" && *v == PropertyValue::Int(42)));
    }

    #[test]
    fn test_resolved_tile_counts() {
        let mut tile = ResolvedTile::default();
        assert!(tile.is_empty());
        tile.sites.push(site());
        assert!(!tile.is_empty());
        assert_eq!(tile.feature_count(), 1);
    }
}
