//! SiteTile - vector tiles for site-monitoring model runs
//!
//! This library serves Mapbox Vector Tiles built from a PostGIS database of
//! model runs, site evaluations and their dated observations. Tiles are
//! cached under a key derived from the freshness of the underlying data, so
//! edits become visible without an explicit invalidation signal.
//!
//! The main entry point is [`service::TileService`]; [`app::SiteTileApp`]
//! wires it to a database pool and a cache provider.

pub mod app;
pub mod cache;
pub mod coalesce;
pub mod config;
pub mod coord;
pub mod encode;
pub mod fingerprint;
pub mod log;
pub mod model;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod temporal;
pub mod tile;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
