//! Tile addressing and sea-level threshold normalization.
//!
//! A sea-level tile is addressed by a [`TileCoord`] (zoom, column, row) and a
//! threshold in meters. Thresholds are bucketed before they reach the cache:
//!
//! - rounded to the nearest multiple of 10 ([`THRESHOLD_STEP`]), with the
//!   integer-division semantics of `(level + 5) / 10 * 10`
//! - clamped to [`MIN_THRESHOLD`]..=[`MAX_THRESHOLD`]
//!
//! so two requests in the same 10 m bucket share one [`CacheKey`].

use std::fmt;

use crate::error::{Result, TileError};

/// Lowest sea level served, in meters.
pub const MIN_THRESHOLD: i32 = -1000;

/// Highest sea level served, in meters.
pub const MAX_THRESHOLD: i32 = 1000;

/// Granularity of the threshold buckets, in meters.
pub const THRESHOLD_STEP: i32 = 10;

/// Round a requested sea level to its 10 m bucket and clamp it to the served range.
///
/// Total over all integers.
///
/// # Examples
///
/// ```
/// use sealevel::key::normalize_threshold;
///
/// assert_eq!(normalize_threshold(4), 0);
/// assert_eq!(normalize_threshold(5), 10);
/// assert_eq!(normalize_threshold(-1005), -1000);
/// assert_eq!(normalize_threshold(1004), 1000);
/// ```
pub fn normalize_threshold(level: i32) -> i32 {
    let half = THRESHOLD_STEP / 2;
    let rounded = (level.saturating_add(half) / THRESHOLD_STEP) * THRESHOLD_STEP;
    rounded.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Address of a 256×256 web-mercator tile.
///
/// Coordinates are not range-checked here; a tile the upstream does not
/// serve fails at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Zoom level.
    pub zoom: u64,
    /// Column (x).
    pub x: u64,
    /// Row (y).
    pub y: u64,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(zoom: u64, x: u64, y: u64) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Exact-match key of the tile cache and the in-flight registry.
///
/// The threshold is stored as given; use [`CacheKey::normalized`] to bucket a
/// raw request first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Already-normalized sea level in meters.
    pub threshold: i32,
    /// Tile being shaded.
    pub coord: TileCoord,
}

impl CacheKey {
    /// Create a key from an already-normalized threshold.
    pub fn new(threshold: i32, coord: TileCoord) -> Self {
        Self { threshold, coord }
    }

    /// Create a key from a raw requested sea level.
    pub fn normalized(level: i32, coord: TileCoord) -> Self {
        Self::new(normalize_threshold(level), coord)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.threshold, self.coord)
    }
}

/// Parse the path segments of a tile request into a normalized [`CacheKey`].
///
/// `level` accepts an optional leading minus sign followed by digits. Levels
/// beyond the `i32` range saturate, so they clamp like any other out-of-range
/// level. `z`, `x` accept digits only; `y_png` is the final segment and must
/// carry the `.png` suffix.
///
/// # Examples
///
/// ```
/// use sealevel::key::{parse_tile_request, TileCoord};
///
/// let key = parse_tile_request("-13", "5", "10", "12.png").unwrap();
/// assert_eq!(key.threshold, -10);
/// assert_eq!(key.coord, TileCoord::new(5, 10, 12));
///
/// let key = parse_tile_request("99999999999", "5", "10", "12.png").unwrap();
/// assert_eq!(key.threshold, 1000);
///
/// assert!(parse_tile_request("abc", "5", "10", "12.png").is_err());
/// ```
pub fn parse_tile_request(level: &str, z: &str, x: &str, y_png: &str) -> Result<CacheKey> {
    let level = parse_level(level)?;
    let coord = parse_coord(z, x, y_png)?;
    Ok(CacheKey::normalized(level, coord))
}

/// Parse the `z`, `x` and `y.png` path segments of a tile request.
pub fn parse_coord(z: &str, x: &str, y_png: &str) -> Result<TileCoord> {
    let zoom = parse_unsigned(z, "zoom level")?;
    let x = parse_unsigned(x, "x coordinate")?;
    let y = y_png
        .strip_suffix(".png")
        .ok_or_else(|| invalid("y coordinate", y_png))?;
    let y = parse_unsigned(y, "y coordinate")?;
    Ok(TileCoord::new(zoom, x, y))
}

fn parse_level(value: &str) -> Result<i32> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if !is_digits(digits) {
        return Err(invalid("sea level", value));
    }
    // Only overflow can fail past the digit check
    Ok(value.parse().unwrap_or(if value.starts_with('-') {
        i32::MIN
    } else {
        i32::MAX
    }))
}

fn parse_unsigned<T: std::str::FromStr>(value: &str, name: &'static str) -> Result<T> {
    if !is_digits(value) {
        return Err(invalid(name, value));
    }
    value.parse().map_err(|_| invalid(name, value))
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn invalid(name: &'static str, value: &str) -> TileError {
    TileError::InvalidParameter {
        name,
        value: value.to_string(),
    }
}
