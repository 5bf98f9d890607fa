//! Error types for the sea-level tile pipeline.

use thiserror::Error;

use crate::key::{CacheKey, TileCoord};

/// Errors that can occur while producing a sea-level tile.
///
/// Every variant except [`TileError::InvalidParameter`] and
/// [`TileError::Config`] is a pipeline failure: it is reported to the caller
/// that ran the pipeline and, unchanged, to every caller that joined it.
/// Nothing is ever cached for a failed key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TileError {
    /// A request parameter is not a valid integer.
    #[error("Invalid {name}: {value:?}")]
    InvalidParameter { name: &'static str, value: String },

    /// The upstream request could not be completed.
    #[error("Failed to fetch elevation tile {coord}: {reason}")]
    Fetch { coord: TileCoord, reason: String },

    /// The upstream request did not finish within the fetch deadline.
    #[error("Elevation tile {coord} not fetched within {timeout_ms}ms")]
    FetchTimeout { coord: TileCoord, timeout_ms: u64 },

    /// The upstream source answered with something other than 200 OK.
    #[error("Elevation tile request for {coord} failed with status: {status}")]
    UpstreamStatus { coord: TileCoord, status: u16 },

    /// The upstream payload is not a usable Terrarium raster.
    #[error("Failed to decode elevation PNG: {reason}")]
    Decode { reason: String },

    /// The mask could not be rendered.
    #[error("Failed to render tile: {reason}")]
    Render { reason: String },

    /// The mask could not be serialized.
    #[error("Failed to encode output PNG: {reason}")]
    Encode { reason: String },

    /// The caller generating this tile went away before finishing.
    #[error("Generation of tile {key} was cancelled")]
    Cancelled { key: CacheKey },

    /// The service was configured with unusable settings.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl TileError {
    /// Returns true if this error came out of the fetch/decode/render/encode
    /// pipeline rather than from the request or configuration.
    pub fn is_pipeline_failure(&self) -> bool {
        !matches!(
            self,
            TileError::InvalidParameter { .. } | TileError::Config { .. }
        )
    }
}

/// Result type alias using [`TileError`].
pub type Result<T> = std::result::Result<T, TileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TileError::InvalidParameter {
            name: "zoom level",
            value: "abc".to_string(),
        };
        assert!(err.to_string().contains("zoom level"));
        assert!(err.to_string().contains("abc"));

        let err = TileError::UpstreamStatus {
            coord: TileCoord::new(3, 4, 5),
            status: 404,
        };
        assert!(err.to_string().contains("3/4/5"));
        assert!(err.to_string().contains("404"));

        let err = TileError::Cancelled {
            key: CacheKey::new(-20, TileCoord::new(1, 0, 1)),
        };
        assert!(err.to_string().contains("-20/1/0/1"));
    }

    #[test]
    fn test_pipeline_failure_classification() {
        let invalid = TileError::InvalidParameter {
            name: "sea level",
            value: "x".to_string(),
        };
        assert!(!invalid.is_pipeline_failure());

        let config = TileError::Config {
            reason: "render bands must be at least 1".to_string(),
        };
        assert!(!config.is_pipeline_failure());

        let fetch = TileError::FetchTimeout {
            coord: TileCoord::new(0, 0, 0),
            timeout_ms: 10,
        };
        assert!(fetch.is_pipeline_failure());
        assert!(TileError::Decode {
            reason: "bad".to_string()
        }
        .is_pipeline_failure());
    }
}
