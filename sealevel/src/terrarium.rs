//! Terrarium elevation decoding.
//!
//! This module provides [`ElevationGrid`], a dense grid of signed elevation
//! samples decoded from a Terrarium-encoded PNG.
//!
//! # Terrarium Format
//!
//! Each pixel stores an elevation in meters across its three color channels:
//!
//! ```text
//! elevation = R * 256 + G + B / 256 - 32768
//! ```
//!
//! using integer arithmetic, so `B / 256` is always zero for 8-bit channels
//! and the fractional meters in the blue channel are discarded.

use image::{ImageFormat, RgbImage};

use crate::error::{Result, TileError};

/// Width and height of every tile, in pixels.
pub const TILE_SIZE: u32 = 256;

/// Offset added to elevations before they are packed into RGB.
const TERRARIUM_OFFSET: i32 = 32768;

/// Decode one Terrarium pixel to an elevation in whole meters.
///
/// # Examples
///
/// ```
/// use sealevel::terrarium::decode_elevation;
///
/// assert_eq!(decode_elevation(128, 0, 0), 0);
/// assert_eq!(decode_elevation(0, 128, 0), -32640);
/// ```
#[inline]
pub fn decode_elevation(r: u8, g: u8, b: u8) -> i32 {
    i32::from(r) * 256 + i32::from(g) + i32::from(b) / 256 - TERRARIUM_OFFSET
}

/// Encode a whole-meter elevation as a Terrarium pixel.
///
/// Elevations outside the representable range saturate.
pub fn encode_elevation(elevation: i32) -> [u8; 3] {
    let v = (elevation + TERRARIUM_OFFSET).clamp(0, 0xFFFF);
    [(v / 256) as u8, (v % 256) as u8, 0]
}

/// Decoded elevation samples for one tile, row-major.
///
/// Immutable after decoding; shared read-only by every render band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationGrid {
    width: u32,
    height: u32,
    samples: Vec<i32>,
}

impl ElevationGrid {
    /// Decode a Terrarium PNG payload.
    ///
    /// Non-RGB sources (RGBA, palette, 16-bit) are converted to 8-bit RGB once
    /// here, before any rendering starts.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::Decode`] if the payload is not a PNG or is smaller
    /// than [`TILE_SIZE`] in either dimension.
    pub fn from_png(payload: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(payload, ImageFormat::Png)
            .map_err(|e| TileError::Decode {
                reason: e.to_string(),
            })?;
        Self::from_rgb(&decoded.into_rgb8())
    }

    /// Decode an RGB image already in memory.
    pub fn from_rgb(image: &RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        check_dimensions(width, height)?;

        let samples = image
            .pixels()
            .map(|p| decode_elevation(p[0], p[1], p[2]))
            .collect();

        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Build a grid from raw elevation samples in row-major order.
    pub fn from_samples(width: u32, height: u32, samples: Vec<i32>) -> Result<Self> {
        check_dimensions(width, height)?;
        if samples.len() != width as usize * height as usize {
            return Err(TileError::Decode {
                reason: format!(
                    "expected {} samples for {}x{}, got {}",
                    width as usize * height as usize,
                    width,
                    height,
                    samples.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Elevation at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the grid.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> i32 {
        self.samples[y as usize * self.width as usize + x as usize]
    }

    /// The samples of row `y`, starting at column 0.
    #[inline]
    pub fn row(&self, y: u32) -> &[i32] {
        let start = y as usize * self.width as usize;
        &self.samples[start..start + self.width as usize]
    }

    /// Grid width in samples.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in samples.
    pub fn height(&self) -> u32 {
        self.height
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width < TILE_SIZE || height < TILE_SIZE {
        return Err(TileError::Decode {
            reason: format!(
                "tile is {}x{}, expected at least {}x{}",
                width, height, TILE_SIZE, TILE_SIZE
            ),
        });
    }
    Ok(())
}
