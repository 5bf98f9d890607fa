//! # sealevel - Sea-Level Overlay Tiles
//!
//! Generates, caches and serves 256×256 PNG overlay tiles that shade every
//! part of a map tile lying below a chosen sea level, recolored on demand
//! from Terrarium-encoded elevation tiles.
//!
//! ## Features
//!
//! - **Fetched once**: concurrent requests for the same tile share a single
//!   upstream fetch and render; all of them get the same bytes or the same error
//! - **Cached**: finished tiles are kept in memory for reuse (bounded or not)
//! - **Parallel**: each tile is rendered in independent row bands on rayon
//! - **Bounded**: upstream fetches run under a deadline
//!
//! ## Quick Start
//!
//! ```ignore
//! use sealevel::{TileCoord, TileServiceBuilder};
//!
//! let service = TileServiceBuilder::from_env().build()?;
//!
//! // Shade everything below 20m on tile 7/63/42
//! let png = service.get_tile(20, TileCoord::new(7, 63, 42)).await?;
//! ```
//!
//! ## Thresholds
//!
//! Requested sea levels are rounded to 10 m buckets and clamped to ±1000 m
//! (see [`key::normalize_threshold`]). Pixels strictly below the threshold are
//! painted [`render::SUBMERGED`]; all others are transparent.
//!
//! ## Data Sources
//!
//! Terrarium tiles from the AWS Terrain Tiles dataset:
//! - <https://registry.opendata.aws/terrain-tiles/>

pub mod cache;
pub mod encode;
pub mod error;
pub mod inflight;
pub mod key;
pub mod render;
pub mod service;
pub mod source;
pub mod terrarium;

// Re-export main types at crate root for convenience
pub use cache::{CachedTile, TileCache};
pub use error::{Result, TileError};
pub use key::{normalize_threshold, CacheKey, TileCoord};
pub use service::{CacheStats, TileService, TileServiceBuilder};
pub use source::{ElevationSource, SourceConfig};

#[cfg(feature = "download")]
pub use source::TerrariumSource;
