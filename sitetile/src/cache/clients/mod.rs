//! Domain-specific cache clients.
//!
//! These clients wrap the generic `Cache` trait with tile-specific key
//! handling and metrics injection.

mod tile;

pub use tile::{CacheLookup, TileCacheClient};
