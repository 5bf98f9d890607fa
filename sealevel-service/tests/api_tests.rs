//! Integration tests for the HTTP API.

use std::future::{Future, IntoFuture};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use bytes::Bytes;
use image::{ImageFormat, RgbImage};
use sealevel::terrarium::{encode_elevation, TILE_SIZE};
use sealevel::{ElevationSource, TileCoord, TileError, TileServiceBuilder};
use sealevel_service::{router, AppState};
use serde_json::Value;

const SUBMERGED: [u8; 4] = [0, 50, 120, 255];
const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Create a Terrarium tile with the given elevation everywhere except the
/// left half, which sits 100m lower.
fn create_test_tile(elevation: i32) -> Bytes {
    let image = RgbImage::from_fn(TILE_SIZE, TILE_SIZE, |x, _| {
        let e = if x < TILE_SIZE / 2 { elevation - 100 } else { elevation };
        image::Rgb(encode_elevation(e))
    });
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    Bytes::from(buffer.into_inner())
}

/// In-memory upstream that counts requests.
struct StubSource {
    payload: Option<Bytes>,
    delay: Duration,
    fetches: Arc<AtomicUsize>,
}

impl ElevationSource for StubSource {
    fn fetch(&self, coord: TileCoord) -> impl Future<Output = sealevel::Result<Bytes>> + Send {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let outcome = self.payload.clone().ok_or(TileError::UpstreamStatus { coord, status: 404 });
        async move {
            tokio::time::sleep(delay).await;
            outcome
        }
    }
}

/// Create a test server over a stub upstream; returns the fetch counter.
fn create_test_server(payload: Option<Bytes>, delay: Duration) -> (TestServer, Arc<AtomicUsize>) {
    let fetches = Arc::new(AtomicUsize::new(0));
    let source = StubSource {
        payload,
        delay,
        fetches: Arc::clone(&fetches),
    };
    let tile_service = TileServiceBuilder::new()
        .cache_size(None)
        .build_with_source(source)
        .unwrap();

    let server = TestServer::new(router(AppState::new(tile_service))).unwrap();
    (server, fetches)
}

fn decode(data: &[u8]) -> image::RgbaImage {
    image::load_from_memory_with_format(data, ImageFormat::Png)
        .unwrap()
        .into_rgba8()
}

#[tokio::test]
async fn test_tile_endpoint_success() {
    let (server, fetches) = create_test_server(Some(create_test_tile(50)), Duration::ZERO);

    let response = server.get("/tile/20/5/10/12.png").await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "image/png");
    assert_eq!(response.header("cache-control"), "public, max-age=3600");
    assert_eq!(response.header("access-control-allow-origin"), "*");

    // Left half at -50m is below 20m, right half at 50m is not
    let mask = decode(response.as_bytes());
    assert_eq!(mask.dimensions(), (TILE_SIZE, TILE_SIZE));
    assert_eq!(mask.get_pixel(0, 0).0, SUBMERGED);
    assert_eq!(mask.get_pixel(255, 255).0, TRANSPARENT);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tile_endpoint_negative_level() {
    let (server, _) = create_test_server(Some(create_test_tile(0)), Duration::ZERO);

    // -60 → left half at -100m is submerged, right half at 0m is not
    let response = server.get("/tile/-60/5/10/12.png").await;
    response.assert_status_ok();

    let mask = decode(response.as_bytes());
    assert_eq!(mask.get_pixel(0, 100).0, SUBMERGED);
    assert_eq!(mask.get_pixel(200, 100).0, TRANSPARENT);
}

#[tokio::test]
async fn test_tile_endpoint_threshold_equal_is_dry() {
    let (server, _) = create_test_server(Some(create_test_tile(30)), Duration::ZERO);

    let response = server.get("/tile/30/1/0/0.png").await;
    response.assert_status_ok();

    let mask = decode(response.as_bytes());
    assert_eq!(mask.get_pixel(200, 0).0, TRANSPARENT);
}

#[tokio::test]
async fn test_tile_endpoint_cached() {
    let (server, fetches) = create_test_server(Some(create_test_tile(50)), Duration::ZERO);

    let first = server.get("/tile/20/5/10/12.png").await;
    let second = server.get("/tile/20/5/10/12.png").await;
    // Same 10m bucket
    let third = server.get("/tile/24/5/10/12.png").await;

    first.assert_status_ok();
    second.assert_status_ok();
    third.assert_status_ok();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(first.as_bytes(), third.as_bytes());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tile_endpoint_concurrent_requests() {
    let (server, fetches) =
        create_test_server(Some(create_test_tile(50)), Duration::from_millis(100));

    let (a, b, c, d) = tokio::join!(
        server.get("/tile/0/8/1/1.png").into_future(),
        server.get("/tile/0/8/1/1.png").into_future(),
        server.get("/tile/0/8/1/1.png").into_future(),
        server.get("/tile/0/8/1/1.png").into_future(),
    );

    for response in [&a, &b, &c, &d] {
        response.assert_status_ok();
        assert_eq!(response.as_bytes(), a.as_bytes());
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tile_endpoint_distinct_thresholds() {
    let (server, fetches) = create_test_server(Some(create_test_tile(50)), Duration::ZERO);

    let low = server.get("/tile/-200/5/10/12.png").await;
    let high = server.get("/tile/200/5/10/12.png").await;

    assert_ne!(low.as_bytes(), high.as_bytes());
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_default_threshold_route() {
    let (server, fetches) = create_test_server(Some(create_test_tile(50)), Duration::ZERO);

    let implicit = server.get("/tile/5/10/12.png").await;
    let explicit = server.get("/tile/0/5/10/12.png").await;

    implicit.assert_status_ok();
    assert_eq!(implicit.as_bytes(), explicit.as_bytes());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tile_endpoint_out_of_range_level_clamps() {
    let (server, fetches) = create_test_server(Some(create_test_tile(50)), Duration::ZERO);

    let huge = server.get("/tile/99999999999/5/10/12.png").await;
    let max = server.get("/tile/1000/5/10/12.png").await;

    huge.assert_status_ok();
    max.assert_status_ok();
    assert_eq!(huge.as_bytes(), max.as_bytes());
    // Everything is below 1000m
    let mask = decode(huge.as_bytes());
    assert_eq!(mask.get_pixel(255, 255).0, SUBMERGED);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tile_endpoint_large_zoom_reaches_upstream() {
    let (server, fetches) = create_test_server(None, Duration::ZERO);

    let response = server.get("/tile/0/300/10/12.png").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tile_endpoint_invalid_parameters() {
    let (server, fetches) = create_test_server(Some(create_test_tile(50)), Duration::ZERO);

    for path in [
        "/tile/abc/5/10/12.png",
        "/tile/1.5/5/10/12.png",
        "/tile/0/z/10/12.png",
        "/tile/0/5/-1/12.png",
        "/tile/0/5/10/y.png",
        "/tile/0/5/10/12",
        "/tile/q/10/12.png",
    ] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let json: Value = response.json();
        assert!(json["error"].as_str().unwrap().contains("Invalid"), "{path}");
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tile_endpoint_upstream_failure() {
    let (server, fetches) = create_test_server(None, Duration::ZERO);

    let response = server.get("/tile/0/5/10/12.png").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("404"));

    // Failures are not cached; the next request tries again
    let response = server.get("/tile/0/5/10/12.png").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_tile_endpoint_malformed_upstream() {
    let (server, _) = create_test_server(Some(Bytes::from_static(b"<html>")), Duration::ZERO);

    let response = server.get("/tile/0/5/10/12.png").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("decode"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = create_test_server(None, Duration::ZERO);

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (server, _) = create_test_server(Some(create_test_tile(50)), Duration::ZERO);

    server.get("/tile/0/5/10/12.png").await.assert_status_ok();
    server.get("/tile/0/5/10/12.png").await.assert_status_ok();

    let response = server.get("/stats").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["cached_tiles"], 1);
    assert_eq!(json["cache_hits"], 1);
    assert_eq!(json["cache_misses"], 1);
    assert_eq!(json["upstream_fetches"], 1);
    assert_eq!(json["in_flight"], 0);
    assert!(json["cache_capacity"].is_null());
    assert_eq!(json["hit_rate"], 0.5);
}
