//! Raw database rows and their conversion into model records.

use geozero::wkb::Wkb;
use geozero::ToGeo;
use sqlx::FromRow;

use crate::model::{
    DisplayAttributes, ObservationCandidate, RegionFeature, SiteFeature, TileGeometry,
};

use super::StoreError;

#[derive(Debug, FromRow)]
pub(crate) struct SiteRow {
    pub id: i64,
    pub label: String,
    pub status: Option<String>,
    pub score: Option<f64>,
    pub version: Option<String>,
    pub performer_name: String,
    pub region_name: Option<String>,
    pub configuration_name: String,
    pub groundtruth: bool,
    pub timemin: Option<i64>,
    pub timemax: Option<i64>,
    pub has_no_observations: bool,
    pub geom: Option<Vec<u8>>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ObservationRow {
    pub id: i64,
    pub site_id: i64,
    pub label: String,
    pub score: Option<f64>,
    pub area: Option<f64>,
    pub observed_year: i32,
    pub has_prior: bool,
    pub own_geom: Option<Vec<u8>>,
    pub prior_geom: Option<Vec<u8>>,
    pub performer_name: String,
    pub region_name: Option<String>,
    pub configuration_name: String,
    pub groundtruth: bool,
    pub timemin: Option<i64>,
    pub timemax: Option<i64>,
}

#[derive(Debug, FromRow)]
pub(crate) struct RegionRow {
    pub id: i64,
    pub name: String,
    pub geom: Option<Vec<u8>>,
}

/// Decode tile-local WKB.
///
/// `ST_AsMVTGeom` returns NULL when clipping leaves nothing, so an absent
/// value decodes to `None` rather than an error.
pub(crate) fn decode_wkb(
    layer: &'static str,
    id: i64,
    wkb: Option<Vec<u8>>,
) -> Result<Option<TileGeometry>, StoreError> {
    match wkb {
        None => Ok(None),
        Some(bytes) => Wkb(bytes)
            .to_geo()
            .map(Some)
            .map_err(|e| StoreError::MalformedGeometry {
                layer,
                id,
                reason: e.to_string(),
            }),
    }
}

impl SiteRow {
    /// Convert into a feature, or `None` when nothing remains after clipping.
    pub fn into_feature(self) -> Result<Option<SiteFeature>, StoreError> {
        let Some(geometry) = decode_wkb("sites", self.id, self.geom)? else {
            return Ok(None);
        };
        Ok(Some(SiteFeature {
            id: self.id,
            label: self.label,
            status: self.status,
            score: self.score,
            version: self.version,
            display: DisplayAttributes {
                performer_name: self.performer_name,
                region_name: self.region_name,
                configuration_name: self.configuration_name,
                groundtruth: self.groundtruth,
            },
            timemin: self.timemin,
            timemax: self.timemax,
            has_no_observations: self.has_no_observations,
            geometry,
        }))
    }
}

impl ObservationRow {
    pub fn into_candidate(self) -> Result<ObservationCandidate, StoreError> {
        let own_geometry = decode_wkb("observations", self.id, self.own_geom)?;
        let prior_geometry = decode_wkb("observations", self.id, self.prior_geom)?;
        Ok(ObservationCandidate {
            id: self.id,
            site_id: self.site_id,
            label: self.label,
            score: self.score,
            area: self.area,
            observed_year: self.observed_year,
            has_prior: self.has_prior,
            own_geometry,
            prior_geometry,
            display: DisplayAttributes {
                performer_name: self.performer_name,
                region_name: self.region_name,
                configuration_name: self.configuration_name,
                groundtruth: self.groundtruth,
            },
            timemin: self.timemin,
            timemax: self.timemax,
        })
    }
}

impl RegionRow {
    pub fn into_feature(self) -> Result<Option<RegionFeature>, StoreError> {
        let Some(geometry) = decode_wkb("regions", self.id, self.geom)? else {
            return Ok(None);
        };
        Ok(Some(RegionFeature {
            id: self.id,
            name: self.name,
            geometry,
        }))
    }
}
