//! Application bootstrap and lifecycle management.
//!
//! This module provides the `SiteTileApp` type which starts every service in
//! order and shuts them down gracefully.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       SiteTileApp                        │
//! │                                                          │
//! │  1. PgSpatialStore ─────────┐                            │
//! │     └── sqlx PgPool         │                            │
//! │                             ▼                            │
//! │  2. CacheService ─────► TileService ──► get_tile()       │
//! │     └── memory | redis | disabled                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sitetile::app::{AppConfig, SiteTileApp};
//! use sitetile::config::ConfigFile;
//!
//! let config = AppConfig::from_config_file(&ConfigFile::load()?)?;
//! let app = SiteTileApp::start(config).await?;
//!
//! let service = app.service();
//!
//! app.shutdown().await;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::SiteTileApp;
pub use config::AppConfig;
pub use error::AppError;
