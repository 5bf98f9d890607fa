//! Sea-level tile service with caching and request coalescing.
//!
//! This module provides [`TileService`], the single entry point of the
//! pipeline: "produce encoded tile bytes for (threshold, z, x, y), or fail".
//!
//! ```text
//! request ─► normalize ─► cache? ──hit──► bytes
//!                            │miss
//!                            ▼
//!                        in-flight? ──join──► wait for owner
//!                            │owner
//!                            ▼
//!        fetch ─► decode ─► render (bands) ─► encode ─► cache ─► resolve
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sealevel::{TileCoord, TileServiceBuilder};
//!
//! let service = TileServiceBuilder::new()
//!     .cache_size(Some(10_000))
//!     .render_bands(8)
//!     .build()?;
//!
//! let png = service.get_tile(-20, TileCoord::new(7, 63, 42)).await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::{CachedTile, TileCache};
use crate::encode::encode_png;
use crate::error::{Result, TileError};
use crate::inflight::{Acquired, InFlight, PipelineOwner};
use crate::key::{CacheKey, TileCoord};
use crate::render::{render_mask, DEFAULT_BANDS};
use crate::source::{ElevationSource, SourceConfig, DEFAULT_TIMEOUT_SECS};
use crate::terrarium::ElevationGrid;

#[cfg(feature = "download")]
use crate::source::TerrariumSource;

/// Default maximum number of cached tiles.
pub const DEFAULT_CACHE_SIZE: u64 = 10_000;

/// Statistics about cache and pipeline usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of requests served from the cache.
    pub hit_count: u64,
    /// Number of requests that started a generation.
    pub miss_count: u64,
    /// Number of requests that joined a generation already running.
    pub coalesced_count: u64,
    /// Number of upstream fetches issued.
    pub upstream_fetches: u64,
    /// Number of generations running right now.
    pub in_flight: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count + self.coalesced_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Produces, caches and serves sea-level overlay tiles.
///
/// Each distinct [`CacheKey`] is generated at most once at a time: concurrent
/// requests for the same key share one upstream fetch and one render, and all
/// of them observe the same bytes or the same error. Successful tiles are
/// cached; failures are not.
pub struct TileService<S> {
    source: S,
    cache: TileCache,
    in_flight: InFlight,
    fetch_timeout: Duration,
    render_bands: usize,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    coalesced_count: AtomicU64,
    upstream_fetches: AtomicU64,
}

impl<S: ElevationSource> TileService<S> {
    /// Create a service over `source` with default settings.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: TileCache::new(Some(DEFAULT_CACHE_SIZE)),
            in_flight: InFlight::new(),
            fetch_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            render_bands: DEFAULT_BANDS,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            coalesced_count: AtomicU64::new(0),
            upstream_fetches: AtomicU64::new(0),
        }
    }

    /// Get the PNG tile for a raw requested sea level.
    ///
    /// The level is normalized first, so levels in the same 10 m bucket (or
    /// beyond the ±1000 m clamp) share one tile.
    pub async fn get_tile(&self, level: i32, coord: TileCoord) -> Result<Bytes> {
        self.tile(CacheKey::normalized(level, coord)).await
    }

    /// Get the PNG tile for an already-normalized key.
    pub async fn tile(&self, key: CacheKey) -> Result<Bytes> {
        if let Some(tile) = self.cache.lookup(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache hit");
            return Ok(tile.into_data());
        }

        match self.in_flight.acquire_or_join(key) {
            Acquired::Waiter(waiter) => {
                self.coalesced_count.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Waiting for in-flight tile");
                waiter.wait().await
            }
            Acquired::Owner(owner) => self.produce(owner).await,
        }
    }

    /// Produce the tile for a freshly registered owner and resolve its waiters.
    async fn produce(&self, owner: PipelineOwner) -> Result<Bytes> {
        let key = owner.key();

        // A previous owner may have cached the tile between our lookup and
        // our registration.
        if let Some(tile) = self.cache.lookup(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return owner.resolve(Ok(tile.into_data()));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let outcome = self.generate(key).await;

        match &outcome {
            Ok(data) => {
                self.cache.insert(key, CachedTile::new(data.clone()));
                info!(key = %key, bytes = data.len(), "Generated and cached tile");
            }
            Err(e) => warn!(key = %key, error = %e, "Tile generation failed"),
        }

        owner.resolve(outcome)
    }

    /// Run the fetch → decode → render → encode pipeline for one key.
    async fn generate(&self, key: CacheKey) -> Result<Bytes> {
        let coord = key.coord;
        let fetch_start = Instant::now();

        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Fetching upstream tile");

        let payload = tokio::time::timeout(self.fetch_timeout, self.source.fetch(coord))
            .await
            .map_err(|_| TileError::FetchTimeout {
                coord,
                timeout_ms: self.fetch_timeout.as_millis() as u64,
            })??;

        let fetch_ms = fetch_start.elapsed().as_millis() as u64;
        debug!(key = %key, elapsed_ms = fetch_ms, "Upstream fetch completed");

        let process_start = Instant::now();
        let threshold = key.threshold;
        let bands = self.render_bands;
        let data = tokio::task::spawn_blocking(move || shade_tile(&payload, threshold, bands))
            .await
            .map_err(|e| TileError::Render {
                reason: e.to_string(),
            })??;

        info!(
            key = %key,
            fetch_ms = fetch_ms,
            process_ms = process_start.elapsed().as_millis() as u64,
            total_ms = fetch_start.elapsed().as_millis() as u64,
            "Tile generation complete"
        );

        Ok(data)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            coalesced_count: self.coalesced_count.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            in_flight: self.in_flight.len() as u64,
        }
    }

    /// Number of tiles being generated right now.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Get the maximum cache size, or `None` when unbounded.
    pub fn cache_capacity(&self) -> Option<u64> {
        self.cache.capacity()
    }

    /// Get the upstream fetch deadline.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Get the number of row bands rendered in parallel.
    pub fn render_bands(&self) -> usize {
        self.render_bands
    }

    /// Get the upstream source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Invalidate (remove) a specific tile from the cache.
    pub fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }

    /// Clear all tiles from the cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Decode a Terrarium payload and turn it into an encoded sea-level mask.
pub fn shade_tile(payload: &[u8], threshold: i32, bands: usize) -> Result<Bytes> {
    let grid = ElevationGrid::from_png(payload)?;
    let mask = render_mask(&grid, threshold, bands)?;
    encode_png(&mask)
}

/// Builder for creating [`TileService`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use sealevel::TileServiceBuilder;
///
/// let service = TileServiceBuilder::new()
///     .cache_size(None) // never evict
///     .fetch_timeout(Duration::from_secs(10))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct TileServiceBuilder {
    cache_size: Option<u64>,
    render_bands: usize,
    source_config: SourceConfig,
}

impl Default for TileServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TileServiceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            cache_size: Some(DEFAULT_CACHE_SIZE),
            render_bands: DEFAULT_BANDS,
            source_config: SourceConfig::default(),
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SEALEVEL_CACHE_SIZE` | Maximum tiles in cache, `0` for unbounded | 10000 |
    /// | `SEALEVEL_FETCH_TIMEOUT_SECS` | Upstream request deadline | 30 |
    /// | `SEALEVEL_RENDER_BANDS` | Row bands rendered in parallel | 8 |
    /// | `SEALEVEL_SOURCE_URL` | URL template with `{z}`, `{x}`, `{y}` | AWS Terrain Tiles |
    /// | `SEALEVEL_USER_AGENT` | Client identifier sent upstream | `sealevel/<version>` |
    ///
    /// Unset or unparseable values fall back to the defaults.
    ///
    /// # Example
    ///
    /// ```bash
    /// export SEALEVEL_CACHE_SIZE=50000
    /// export SEALEVEL_SOURCE_URL="https://tiles.example.com/terrarium/{z}/{x}/{y}.png"
    /// ```
    pub fn from_env() -> Self {
        let mut builder = Self::new();

        if let Some(size) = env_parse::<u64>("SEALEVEL_CACHE_SIZE") {
            builder = builder.cache_size(if size == 0 { None } else { Some(size) });
        }
        if let Some(secs) = env_parse::<u64>("SEALEVEL_FETCH_TIMEOUT_SECS") {
            builder = builder.fetch_timeout(Duration::from_secs(secs));
        }
        if let Some(bands) = env_parse::<usize>("SEALEVEL_RENDER_BANDS") {
            builder = builder.render_bands(bands);
        }
        if let Ok(template) = std::env::var("SEALEVEL_SOURCE_URL") {
            builder = builder.url_template(template);
        }
        if let Ok(user_agent) = std::env::var("SEALEVEL_USER_AGENT") {
            builder = builder.user_agent(user_agent);
        }

        builder
    }

    /// Set the maximum number of cached tiles, or `None` to never evict.
    pub fn cache_size(mut self, size: Option<u64>) -> Self {
        self.cache_size = size;
        self
    }

    /// Set the upstream fetch deadline.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.source_config.timeout = timeout;
        self
    }

    /// Set the number of row bands rendered in parallel. Must be at least 1.
    pub fn render_bands(mut self, bands: usize) -> Self {
        self.render_bands = bands;
        self
    }

    /// Set the upstream URL template.
    pub fn url_template(mut self, template: impl Into<String>) -> Self {
        self.source_config.url_template = template.into();
        self
    }

    /// Set the client identifier sent upstream.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.source_config.user_agent = user_agent.into();
        self
    }

    /// The upstream source configuration collected so far.
    pub fn source_config(&self) -> &SourceConfig {
        &self.source_config
    }

    /// Build the [`TileService`] over a caller-supplied source.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Config`] if the render band count is 0.
    pub fn build_with_source<S: ElevationSource>(self, source: S) -> Result<TileService<S>> {
        if self.render_bands == 0 {
            return Err(TileError::Config {
                reason: "render bands must be at least 1".to_string(),
            });
        }

        Ok(TileService {
            source,
            cache: TileCache::new(self.cache_size),
            in_flight: InFlight::new(),
            fetch_timeout: self.source_config.timeout,
            render_bands: self.render_bands,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            coalesced_count: AtomicU64::new(0),
            upstream_fetches: AtomicU64::new(0),
        })
    }

    /// Build the [`TileService`] fetching from the configured HTTP source.
    ///
    /// # Errors
    ///
    /// Returns an error if the band count is 0 or the HTTP client cannot be
    /// created (e.g., due to TLS initialization failure).
    #[cfg(feature = "download")]
    pub fn build(self) -> Result<TileService<TerrariumSource>> {
        let source = TerrariumSource::new(self.source_config.clone())?;
        self.build_with_source(source)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
