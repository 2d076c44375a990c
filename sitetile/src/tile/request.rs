//! Tile request types.
//!
//! Provides the `TileRequest` type that encapsulates everything needed to
//! produce one vector tile: the model run, the tile coordinate, the reference
//! year and an optional edit session. All parts arrive as untrusted request
//! parameters, so each has a validating constructor.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::coord::TileCoord;
use crate::tile::TileServiceError;

/// Maximum length of an edit session token.
pub const MAX_SESSION_KEY_LEN: usize = 256;

/// Number of hex characters of the session digest kept in cache keys.
const SESSION_DIGEST_LEN: usize = 16;

const MODEL_RUN_PATTERN: &str = r"^[A-Za-z0-9_.:\-]{1,128}$";

fn model_run_pattern() -> Result<&'static Regex, TileServiceError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(MODEL_RUN_PATTERN))
        .as_ref()
        .map_err(|e| TileServiceError::InvalidRequest(format!("model run pattern: {}", e)))
}

/// Opaque model run identifier.
///
/// The identifier is never interpreted, but it is restricted to a safe
/// character set because it ends up in layer names and cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRunId(String);

impl ModelRunId {
    /// Validate and wrap a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, TileServiceError> {
        if model_run_pattern()?.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(TileServiceError::InvalidRequest(format!(
                "malformed model run id {:?}",
                raw
            )))
        }
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calendar year the tile is requested "as of".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceYear(i32);

impl ReferenceYear {
    /// Create a reference year; only four-digit years are accepted.
    pub fn new(year: i32) -> Result<Self, TileServiceError> {
        if (1000..=9999).contains(&year) {
            Ok(Self(year))
        } else {
            Err(TileServiceError::InvalidRequest(format!(
                "year {} is not a four-digit year",
                year
            )))
        }
    }

    /// Parse a year from a request parameter.
    pub fn parse(raw: &str) -> Result<Self, TileServiceError> {
        let year = raw.trim().parse::<i32>().map_err(|_| {
            TileServiceError::InvalidRequest(format!("year {:?} is not numeric", raw))
        })?;
        Self::new(year)
    }

    /// The year as an integer.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ReferenceYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token identifying a user's unpublished editing session.
///
/// Only a digest of the token reaches cache keys, so arbitrary client text
/// never becomes part of the shared key space.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EditSessionKey(String);

impl EditSessionKey {
    /// Validate a session token.
    pub fn parse(raw: &str) -> Result<Self, TileServiceError> {
        if raw.is_empty() || raw.len() > MAX_SESSION_KEY_LEN {
            return Err(TileServiceError::InvalidRequest(format!(
                "edit session key must be 1..={} bytes",
                MAX_SESSION_KEY_LEN
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Short hex digest of the token, used as the key suffix.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let mut hex = format!("{:x}", hasher.finalize());
        hex.truncate(SESSION_DIGEST_LEN);
        hex
    }
}

// Tokens are credentials of sorts; keep them out of debug logs.
impl fmt::Debug for EditSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EditSessionKey({})", self.digest())
    }
}

/// Request for one vector tile.
///
/// # Example
///
/// ```
/// use sitetile::tile::TileRequest;
///
/// let request = TileRequest::parse("M1", "10", "511", "511", "2021", None).unwrap();
/// assert_eq!(request.model_run().as_str(), "M1");
/// assert_eq!(request.coord().zoom, 10);
/// assert_eq!(request.year().value(), 2021);
/// assert!(request.session().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileRequest {
    model_run: ModelRunId,
    coord: TileCoord,
    year: ReferenceYear,
    session: Option<EditSessionKey>,
}

impl TileRequest {
    /// Create a request from already validated parts.
    pub fn new(
        model_run: ModelRunId,
        coord: TileCoord,
        year: ReferenceYear,
        session: Option<EditSessionKey>,
    ) -> Self {
        Self {
            model_run,
            coord,
            year,
            session,
        }
    }

    /// Build a request from raw, untrusted request parameters.
    ///
    /// Every failure is reported as [`TileServiceError::InvalidRequest`].
    pub fn parse(
        model_run: &str,
        z: &str,
        x: &str,
        y: &str,
        year: &str,
        session: Option<&str>,
    ) -> Result<Self, TileServiceError> {
        let model_run = ModelRunId::parse(model_run)?;
        let zoom = parse_index::<u8>("z", z)?;
        let x = parse_index::<u32>("x", x)?;
        let y = parse_index::<u32>("y", y)?;
        let coord = TileCoord::new(zoom, x, y)?;
        let year = ReferenceYear::parse(year)?;
        let session = match session {
            Some(raw) if !raw.is_empty() => Some(EditSessionKey::parse(raw)?),
            _ => None,
        };
        Ok(Self::new(model_run, coord, year, session))
    }

    /// The model run the tile belongs to.
    pub fn model_run(&self) -> &ModelRunId {
        &self.model_run
    }

    /// The tile coordinate.
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// The reference year.
    pub fn year(&self) -> ReferenceYear {
        self.year
    }

    /// The edit session, if the caller is editing unpublished changes.
    pub fn session(&self) -> Option<&EditSessionKey> {
        self.session.as_ref()
    }

    /// The same request without its edit session.
    pub fn published(&self) -> Self {
        Self {
            session: None,
            ..self.clone()
        }
    }
}

fn parse_index<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, TileServiceError> {
    raw.trim().parse::<T>().map_err(|_| {
        TileServiceError::InvalidRequest(format!(
            "{} must be a non-negative integer, got {:?}",
            name, raw
        ))
    })
}
