//! HTTP request handlers for the tile service.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sealevel::{key, CacheKey, ElevationSource, TileError};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Sea level used by the threshold-less tile route, in meters.
pub const DEFAULT_THRESHOLD: i32 = 0;

/// Browser cache lifetime for served tiles.
const TILE_CACHE_CONTROL: &str = "public, max-age=3600";

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Cache statistics response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Number of tiles in cache.
    pub cached_tiles: u64,
    /// Maximum number of cached tiles (null when unbounded).
    pub cache_capacity: Option<u64>,
    /// Cache hit count.
    pub cache_hits: u64,
    /// Cache miss count (generations started).
    pub cache_misses: u64,
    /// Requests that joined an in-flight generation.
    pub coalesced_requests: u64,
    /// Upstream fetches issued.
    pub upstream_fetches: u64,
    /// Generations running right now.
    pub in_flight: u64,
    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
}

/// Get a sea-level tile.
///
/// # Path
///
/// `/tile/{level}/{z}/{x}/{y}.png` where `level` is the sea level in meters
/// (optional leading `-`), rounded to 10 m and clamped to ±1000 m.
///
/// # Returns
///
/// - `200 OK` with `image/png` tile bytes
/// - `400 Bad Request` if a path segment is not an integer
/// - `500 Internal Server Error` if the tile cannot be generated
pub async fn get_tile<S: ElevationSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((level, z, x, y)): Path<(String, String, String, String)>,
) -> Response {
    match key::parse_tile_request(&level, &z, &x, &y) {
        Ok(key) => serve_tile(&state, key).await,
        Err(e) => error_response(e),
    }
}

/// Get a tile at the default sea level of 0 m.
///
/// # Path
///
/// `/tile/{z}/{x}/{y}.png`
pub async fn get_default_tile<S: ElevationSource>(
    State(state): State<Arc<AppState<S>>>,
    Path((z, x, y)): Path<(String, String, String)>,
) -> Response {
    match key::parse_coord(&z, &x, &y) {
        Ok(coord) => serve_tile(&state, CacheKey::normalized(DEFAULT_THRESHOLD, coord)).await,
        Err(e) => error_response(e),
    }
}

async fn serve_tile<S: ElevationSource>(state: &AppState<S>, key: CacheKey) -> Response {
    match state.tile_service.tile(key).await {
        Ok(data) => {
            tracing::info!(key = %key, bytes = data.len(), "Served tile");
            (
                [
                    (header::CONTENT_TYPE, "image/png"),
                    (header::CACHE_CONTROL, TILE_CACHE_CONTROL),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                ],
                data,
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Create an error response for tile requests.
fn error_response(e: TileError) -> Response {
    let (status, message) = if e.is_pipeline_failure() {
        tracing::warn!(error = %e, "Error generating tile");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to generate tile: {}", e),
        )
    } else {
        tracing::debug!(error = %e, "Rejected tile request");
        (StatusCode::BAD_REQUEST, e.to_string())
    };

    (status, Json(ErrorResponse { error: message })).into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get cache statistics.
pub async fn get_stats<S: ElevationSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<StatsResponse> {
    let stats = state.tile_service.cache_stats();

    Json(StatsResponse {
        cached_tiles: stats.entry_count,
        cache_capacity: state.tile_service.cache_capacity(),
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        coalesced_requests: stats.coalesced_count,
        upstream_fetches: stats.upstream_fetches,
        in_flight: stats.in_flight,
        hit_rate: stats.hit_rate(),
    })
}
