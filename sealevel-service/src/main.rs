//! Sea Level Service - HTTP microservice for sea-level overlay tiles.
//!
//! Serves 256×256 PNG tiles shading everything below a chosen sea level,
//! generated on demand from Terrarium elevation tiles.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PORT` | HTTP server port | 19385 |
//! | `SEALEVEL_CACHE_SIZE` | Maximum tiles in cache, `0` for unbounded | 10000 |
//! | `SEALEVEL_FETCH_TIMEOUT_SECS` | Upstream request deadline | 30 |
//! | `SEALEVEL_RENDER_BANDS` | Row bands rendered in parallel | 8 |
//! | `SEALEVEL_SOURCE_URL` | Upstream URL template (`{z}`, `{x}`, `{y}`) | AWS Terrain Tiles |
//! | `SEALEVEL_USER_AGENT` | Client identifier sent upstream | `sealevel/<version>` |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /tile/{level}/{z}/{x}/{y}.png` - Sea-level tile
//! - `GET /tile/{z}/{x}/{y}.png` - Sea-level tile at 0m
//! - `GET /health` - Health check
//! - `GET /stats` - Cache statistics

use std::net::SocketAddr;

use sealevel::TileServiceBuilder;
use sealevel_service::{router, AppState};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Port used when `PORT` is unset or invalid.
const DEFAULT_PORT: u16 = 19385;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealevel_service=info,sealevel=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    // The library handles the SEALEVEL_* variables
    let tile_service = TileServiceBuilder::from_env().build()?;

    tracing::info!(
        source = %tile_service.source().config().url_template,
        user_agent = %tile_service.source().config().user_agent,
        cache_capacity = ?tile_service.cache_capacity(),
        fetch_timeout_ms = tile_service.fetch_timeout().as_millis() as u64,
        render_bands = tile_service.render_bands(),
        port = port,
        "Starting sea level tile service"
    );

    let app = router(AppState::new(tile_service)).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Tile endpoint: http://{}/tile/{{level}}/{{z}}/{{x}}/{{y}}.png", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
