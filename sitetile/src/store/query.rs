//! Spatial query composition.
//!
//! A [`TileQuery`] captures everything needed to read one tile: the model
//! run, the tile envelope, the reference year, and the tile-local extent and
//! buffer used by `ST_AsMVTGeom`. Each layer becomes a [`SpatialQuery`]: SQL
//! text with numbered placeholders plus the values to bind, in order.
//!
//! All request values travel as bound parameters. Nothing from the request
//! is ever interpolated into SQL text.
//!
//! # Observation selection
//!
//! Every observation of the model run's sites is a row. For year `Y`, a row
//! from year `Y` keeps its own geometry; any other row takes the geometry of
//! the site's latest observation from a year before `Y`, and is dropped when
//! there is none:
//!
//! ```text
//! observations:   2019 ────────── 2021
//! year = 2018:    (none)          (none)
//! year = 2019:    2019 (own)      (none)
//! year = 2020:    2019 geom       2019 geom
//! year = 2021:    2019 geom       2021 (own)
//! ```
//!
//! The effective geometry, own or carried forward, is what gets tested
//! against the tile envelope. Time bounds always describe the row's own
//! window: its timestamp up to the next observation of the same site, or the
//! site end date when it is the last one.

use crate::coord::{MercatorBounds, TileCoord};
use crate::encode::DEFAULT_EXTENT;
use crate::tile::{ModelRunId, ReferenceYear, TileRequest};

/// Default clipping buffer around the tile, in tile-local units.
pub const DEFAULT_BUFFER: u32 = 64;

/// Spatial reference of stored geometries (Web Mercator).
const STORE_SRID: i32 = 3857;

/// Performer code whose approved sites count as ground truth.
const GROUNDTRUTH_PERFORMER: &str = "TE";

/// A value bound to a query placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    Float(f64),
    Int(i32),
}

/// SQL text together with its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

/// Allocates numbered placeholders while collecting their values.
#[derive(Debug, Default)]
struct ParamBinder {
    params: Vec<QueryParam>,
}

impl ParamBinder {
    fn bind(&mut self, param: QueryParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn finish(self, sql: String) -> SpatialQuery {
        SpatialQuery {
            sql,
            params: self.params,
        }
    }
}

/// Placeholders shared by every layer query.
struct CommonParams {
    model_run: String,
    envelope: String,
    extent: String,
    buffer: String,
}

/// Parameters of one tile read.
#[derive(Debug, Clone, PartialEq)]
pub struct TileQuery {
    model_run: ModelRunId,
    coord: TileCoord,
    year: ReferenceYear,
    extent: u32,
    buffer: u32,
}

impl TileQuery {
    /// Build a query for a validated request.
    ///
    /// # Arguments
    ///
    /// * `request` - The tile request
    /// * `extent` - Tile-local coordinate range (usually 4096)
    /// * `buffer` - Clipping buffer beyond the tile edge, in tile units
    pub fn new(request: &TileRequest, extent: u32, buffer: u32) -> Self {
        Self {
            model_run: request.model_run().clone(),
            coord: request.coord(),
            year: request.year(),
            extent,
            buffer,
        }
    }

    /// Build a query with the default extent and buffer.
    pub fn with_defaults(request: &TileRequest) -> Self {
        Self::new(request, DEFAULT_EXTENT, DEFAULT_BUFFER)
    }

    pub fn model_run(&self) -> &ModelRunId {
        &self.model_run
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn year(&self) -> ReferenceYear {
        self.year
    }

    pub fn extent(&self) -> u32 {
        self.extent
    }

    pub fn buffer(&self) -> u32 {
        self.buffer
    }

    /// Web Mercator envelope of the tile.
    pub fn bounds(&self) -> MercatorBounds {
        self.coord.mercator_bounds()
    }

    fn bind_common(&self, binder: &mut ParamBinder) -> CommonParams {
        let model_run = binder.bind(QueryParam::Text(self.model_run.as_str().to_string()));
        let b = self.bounds();
        let min_x = binder.bind(QueryParam::Float(b.min_x));
        let min_y = binder.bind(QueryParam::Float(b.min_y));
        let max_x = binder.bind(QueryParam::Float(b.max_x));
        let max_y = binder.bind(QueryParam::Float(b.max_y));
        let extent = binder.bind(QueryParam::Int(clamp_i32(self.extent)));
        let buffer = binder.bind(QueryParam::Int(clamp_i32(self.buffer)));
        CommonParams {
            model_run,
            envelope: format!(
                "ST_MakeEnvelope({}, {}, {}, {}, {})",
                min_x, min_y, max_x, max_y, STORE_SRID
            ),
            extent,
            buffer,
        }
    }

    /// Query for the `sites` layer.
    pub fn sites(&self) -> SpatialQuery {
        let mut binder = ParamBinder::default();
        let p = self.bind_common(&mut binder);

        let sql = format!(
            r#"WITH envelope AS (SELECT {envelope} AS geom)
SELECT
    se.id::bigint AS id,
    se.label AS label,
    se.status AS status,
    se.score::float8 AS score,
    se.version AS version,
    {display},
    EXTRACT(EPOCH FROM se.start_date)::bigint AS timemin,
    EXTRACT(EPOCH FROM se.end_date)::bigint AS timemax,
    NOT EXISTS (
        SELECT 1 FROM site_observation so WHERE so.siteeval_id = se.id
    ) AS has_no_observations,
    {geom} AS geom
FROM site_evaluation se
{joins}
CROSS JOIN envelope
WHERE mr.id::text = {model_run}
  AND ST_Intersects(se.geom, envelope.geom)
ORDER BY se.id"#,
            envelope = p.envelope,
            display = display_columns(),
            joins = display_joins(),
            geom = mvt_geom("se.geom", &p),
            model_run = p.model_run,
        );

        binder.finish(sql)
    }

    /// Query for the `observations` layer, one candidate per observation.
    pub fn observations(&self) -> SpatialQuery {
        let mut binder = ParamBinder::default();
        let p = self.bind_common(&mut binder);
        let year = binder.bind(QueryParam::Int(self.year.value()));

        let sql = format!(
            r#"WITH envelope AS (SELECT {envelope} AS geom)
SELECT
    so.id::bigint AS id,
    se.id::bigint AS site_id,
    so.label AS label,
    so.score::float8 AS score,
    so.area::float8 AS area,
    EXTRACT(YEAR FROM so.timestamp)::int AS observed_year,
    prev.geom IS NOT NULL AS has_prior,
    CASE WHEN EXTRACT(YEAR FROM so.timestamp)::int = {year} THEN {own_geom} END AS own_geom,
    CASE WHEN EXTRACT(YEAR FROM so.timestamp)::int <> {year} THEN {prior_geom} END AS prior_geom,
    {display},
    EXTRACT(EPOCH FROM so.timestamp)::bigint AS timemin,
    EXTRACT(EPOCH FROM COALESCE(
        (
            SELECT MIN(nxt.timestamp) FROM site_observation nxt
            WHERE nxt.siteeval_id = so.siteeval_id
              AND nxt.timestamp > so.timestamp
        ),
        se.end_date
    ))::bigint AS timemax
FROM site_evaluation se
{joins}
CROSS JOIN envelope
JOIN site_observation so ON so.siteeval_id = se.id
LEFT JOIN LATERAL (
    SELECT earlier.geom
    FROM site_observation earlier
    WHERE earlier.siteeval_id = se.id
      AND EXTRACT(YEAR FROM earlier.timestamp)::int < {year}
    ORDER BY earlier.timestamp DESC, earlier.id DESC
    LIMIT 1
) prev ON true
WHERE mr.id::text = {model_run}
  AND (
    (EXTRACT(YEAR FROM so.timestamp)::int = {year}
        AND ST_Intersects(so.geom, envelope.geom))
    OR (EXTRACT(YEAR FROM so.timestamp)::int <> {year}
        AND ST_Intersects(prev.geom, envelope.geom))
  )
ORDER BY se.id, so.timestamp, so.id"#,
            envelope = p.envelope,
            year = year,
            own_geom = mvt_geom("so.geom", &p),
            prior_geom = mvt_geom("prev.geom", &p),
            display = display_columns(),
            joins = display_joins(),
            model_run = p.model_run,
        );

        binder.finish(sql)
    }

    /// Query for the `regions` layer.
    pub fn regions(&self) -> SpatialQuery {
        let mut binder = ParamBinder::default();
        let p = self.bind_common(&mut binder);

        let sql = format!(
            r#"WITH envelope AS (SELECT {envelope} AS geom)
SELECT
    r.id::bigint AS id,
    r.name AS name,
    {geom} AS geom
FROM model_run mr
JOIN region r ON r.id = mr.region_id
CROSS JOIN envelope
WHERE mr.id::text = {model_run}
  AND ST_Intersects(r.geom, envelope.geom)
ORDER BY r.id"#,
            envelope = p.envelope,
            geom = mvt_geom("r.geom", &p),
            model_run = p.model_run,
        );

        binder.finish(sql)
    }
}

/// Query for the freshness timestamp of a model run.
///
/// Returns no row for an unknown model run. The `GREATEST` covers a model
/// run with no site evaluations yet, where `MAX` yields NULL.
pub fn latest_modification_query(model_run: &ModelRunId) -> SpatialQuery {
    let mut binder = ParamBinder::default();
    let id = binder.bind(QueryParam::Text(model_run.as_str().to_string()));

    let sql = format!(
        r#"SELECT GREATEST(MAX(se.modified), mr.created) AS modified
FROM model_run mr
LEFT JOIN site_evaluation se ON se.configuration_id = mr.id
WHERE mr.id::text = {id}
GROUP BY mr.id, mr.created"#
    );

    binder.finish(sql)
}

fn display_columns() -> String {
    format!(
        r#"p.short_code AS performer_name,
    reg.name AS region_name,
    mr.title AS configuration_name,
    COALESCE(p.short_code = '{gt}' AND se.score = 1, false) AS groundtruth"#,
        gt = GROUNDTRUTH_PERFORMER
    )
}

fn display_joins() -> &'static str {
    r#"JOIN model_run mr ON mr.id = se.configuration_id
JOIN performer p ON p.id = mr.performer_id
LEFT JOIN region reg ON reg.id = mr.region_id"#
}

/// Clip a geometry column to the tile and return it as tile-local WKB.
fn mvt_geom(column: &str, p: &CommonParams) -> String {
    format!(
        "ST_AsBinary(ST_AsMVTGeom({}, envelope.geom, {}, {}, true))",
        column, p.extent, p.buffer
    )
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
