//! Sea Level Service Library
//!
//! HTTP handlers and routing for the sea-level tile service.
//! This library is used by both the sealevel-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use sealevel::{ElevationSource, TileService};

/// Application state shared across handlers.
pub struct AppState<S> {
    /// Tile pipeline serving every tile request.
    pub tile_service: TileService<S>,
}

impl<S> AppState<S> {
    /// Wrap a tile service for sharing across handlers.
    pub fn new(tile_service: TileService<S>) -> Arc<Self> {
        Arc::new(Self { tile_service })
    }
}

/// Build the application router (without middleware layers).
///
/// - `GET /tile/{level}/{z}/{x}/{y}.png` - sea-level tile
/// - `GET /tile/{z}/{x}/{y}.png` - sea-level tile at 0m
/// - `GET /health` - health check
/// - `GET /stats` - cache statistics
pub fn router<S: ElevationSource + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/tile/:level/:z/:x/:y", get(handlers::get_tile::<S>))
        .route("/tile/:z/:x/:y", get(handlers::get_default_tile::<S>))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats::<S>))
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{ErrorResponse, HealthResponse, StatsResponse};
