//! Tile request and error types shared by every stage of tile production.

mod error;
mod request;

pub use error::{ErrorKind, TileServiceError};
pub use request::{EditSessionKey, ModelRunId, ReferenceYear, TileRequest, MAX_SESSION_KEY_LEN};
