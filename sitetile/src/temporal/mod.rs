//! Reference-year resolution for observations.
//!
//! Annotation is sparse across years, so a site may have no observation in
//! the requested year. The rule for year `Y`:
//!
//! 1. an observation from year `Y` shows its own geometry;
//! 2. otherwise the latest observation from a year before `Y` is carried
//!    forward;
//! 3. otherwise the site has no geometry yet and is left out of the
//!    observations layer.
//!
//! The chosen geometry is also the one that must intersect the tile. A
//! candidate whose chosen geometry missed the envelope (`None`) is dropped
//! even if its other geometry is inside.
//!
//! Time bounds are passed through untouched so they keep describing the
//! row's own observation, also when its geometry is borrowed.

use tracing::debug;

use crate::model::{ObservationCandidate, ObservationFeature, ResolvedTile, TileRows};
use crate::tile::ReferenceYear;

/// Outcome of resolving one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The observation's own geometry applies.
    Own(ObservationFeature),
    /// An earlier year's geometry is carried forward.
    CarriedForward(ObservationFeature),
    /// No applicable geometry for this year.
    Excluded,
}

impl Resolution {
    pub fn into_feature(self) -> Option<ObservationFeature> {
        match self {
            Resolution::Own(f) | Resolution::CarriedForward(f) => Some(f),
            Resolution::Excluded => None,
        }
    }
}

/// Apply the reference-year rule to one candidate.
pub fn resolve_candidate(candidate: ObservationCandidate, year: ReferenceYear) -> Resolution {
    let own_year = candidate.observed_year == year.value();

    let (geometry, carried_forward) = if own_year {
        match candidate.own_geometry {
            Some(g) => (g, false),
            None => return Resolution::Excluded,
        }
    } else if candidate.has_prior {
        match candidate.prior_geometry {
            Some(g) => (g, true),
            None => return Resolution::Excluded,
        }
    } else {
        return Resolution::Excluded;
    };

    let feature = ObservationFeature {
        id: candidate.id,
        site_id: candidate.site_id,
        label: candidate.label,
        score: candidate.score,
        area: candidate.area,
        observed_year: candidate.observed_year,
        carried_forward,
        display: candidate.display,
        timemin: candidate.timemin,
        timemax: candidate.timemax,
        geometry,
    };

    if carried_forward {
        Resolution::CarriedForward(feature)
    } else {
        Resolution::Own(feature)
    }
}

/// Resolve every observation candidate of a tile.
///
/// A site may contribute several observations; each keeps its own identity
/// and time window.
pub fn resolve(rows: TileRows, year: ReferenceYear) -> ResolvedTile {
    let total = rows.observations.len();
    let observations: Vec<ObservationFeature> = rows
        .observations
        .into_iter()
        .filter_map(|c| resolve_candidate(c, year).into_feature())
        .collect();
    let carried = observations.iter().filter(|f| f.carried_forward).count();

    debug!(
        year = year.value(),
        candidates = total,
        resolved = observations.len(),
        carried_forward = carried,
        "Resolved observations"
    );

    ResolvedTile {
        sites: rows.sites,
        observations,
        regions: rows.regions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DisplayAttributes, TileGeometry};
    use geo_types::{point, Geometry};

    fn geom(x: f64) -> TileGeometry {
        Geometry::Point(point!(x: x, y: x))
    }

    fn year(y: i32) -> ReferenceYear {
        ReferenceYear::new(y).unwrap()
    }

    fn candidate(
        id: i64,
        observed_year: i32,
        has_prior: bool,
        own: Option<TileGeometry>,
        prior: Option<TileGeometry>,
    ) -> ObservationCandidate {
        ObservationCandidate {
            id,
            site_id: 1,
            label: "positive".to_string(),
            score: None,
            area: None,
            observed_year,
            has_prior,
            own_geometry: own,
            prior_geometry: prior,
            display: DisplayAttributes::default(),
            timemin: Some(1_560_000_000),
            timemax: Some(1_620_000_000),
        }
    }

    #[test]
    fn test_own_year_uses_own_geometry() {
        let c = candidate(1, 2019, false, Some(geom(1.0)), None);
        match resolve_candidate(c, year(2019)) {
            Resolution::Own(f) => {
                assert_eq!(f.geometry, geom(1.0));
                assert!(!f.carried_forward);
            }
            other => panic!("expected own geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_gap_year_carries_prior_forward() {
        // Observations in 2019 and 2021; the 2019 one is effective for 2020.
        let c = candidate(1, 2019, true, None, Some(geom(19.0)));
        match resolve_candidate(c, year(2020)) {
            Resolution::CarriedForward(f) => {
                assert_eq!(f.geometry, geom(19.0));
                assert_eq!(f.observed_year, 2019);
                assert_eq!(f.timemin, Some(1_560_000_000));
            }
            other => panic!("expected carried geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_year_before_first_observation_is_excluded() {
        let c = candidate(1, 2019, false, Some(geom(1.0)), None);
        assert_eq!(resolve_candidate(c, year(2018)), Resolution::Excluded);
    }

    #[test]
    fn test_carried_geometry_outside_tile_is_excluded() {
        // The own geometry is inside but the carried one decides.
        let c = candidate(1, 2019, true, Some(geom(1.0)), None);
        assert_eq!(resolve_candidate(c, year(2020)), Resolution::Excluded);
    }

    #[test]
    fn test_own_geometry_outside_tile_is_excluded() {
        let c = candidate(1, 2021, true, None, Some(geom(2.0)));
        assert_eq!(resolve_candidate(c, year(2021)), Resolution::Excluded);
    }

    #[test]
    fn test_later_observation_borrows_prior_geometry_in_gap_year() {
        // A 2021 row has no own geometry for 2020; the 2019 one stands in.
        let c = candidate(21, 2021, true, None, Some(geom(19.0)));
        match resolve_candidate(c, year(2020)) {
            Resolution::CarriedForward(f) => {
                assert_eq!(f.id, 21);
                assert_eq!(f.observed_year, 2021);
                assert_eq!(f.geometry, geom(19.0));
            }
            other => panic!("expected carried geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_every_observation_of_a_site_is_kept() {
        let observations = |y: i32| match y {
            2021 => vec![
                candidate(19, 2019, true, None, Some(geom(19.0))),
                candidate(21, 2021, true, Some(geom(21.0)), None),
            ],
            _ => vec![
                candidate(19, 2019, true, None, Some(geom(19.0))),
                candidate(21, 2021, true, None, Some(geom(19.0))),
            ],
        };

        let tile = resolve(
            TileRows {
                observations: observations(2021),
                ..Default::default()
            },
            year(2021),
        );
        let ids: Vec<i64> = tile.observations.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![19, 21]);
        assert_eq!(tile.observations[0].geometry, geom(19.0));
        assert!(tile.observations[0].carried_forward);
        assert_eq!(tile.observations[1].geometry, geom(21.0));
        assert!(!tile.observations[1].carried_forward);

        let tile = resolve(
            TileRows {
                observations: observations(2020),
                ..Default::default()
            },
            year(2020),
        );
        assert_eq!(tile.observations.len(), 2);
        assert!(tile.observations.iter().all(|f| f.geometry == geom(19.0)));
        assert!(tile
            .observations
            .iter()
            .all(|f| f.timemin == Some(1_560_000_000)));
    }

    #[test]
    fn test_sites_and_regions_pass_through() {
        let rows = TileRows::default();
        let tile = resolve(rows, year(2020));
        assert!(tile.is_empty());
    }
}
