//! CLI command implementations.

pub mod config;
pub mod key;
pub mod serve;
pub mod tile;

use clap::Args;
use sitetile::tile::TileRequest;

use crate::error::CliError;

/// Tile address shared by the `tile` and `key` commands.
#[derive(Debug, Clone, Args)]
pub struct TileArgs {
    /// Model run identifier
    pub model_run: String,
    /// Zoom level
    pub z: String,
    /// Tile column
    pub x: String,
    /// Tile row
    pub y: String,

    /// Reference year (e.g. 2021)
    #[arg(long)]
    pub year: String,

    /// Edit session key
    #[arg(long)]
    pub session: Option<String>,
}

impl TileArgs {
    /// Validate into a tile request.
    pub fn to_request(&self) -> Result<TileRequest, CliError> {
        Ok(TileRequest::parse(
            &self.model_run,
            &self.z,
            &self.x,
            &self.y,
            &self.year,
            self.session.as_deref(),
        )?)
    }
}
