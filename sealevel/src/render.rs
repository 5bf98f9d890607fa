//! Sea-level mask rendering.
//!
//! Every pixel of a 256×256 tile is classified against the threshold:
//! elevations strictly below it are painted [`SUBMERGED`], everything else is
//! [`TRANSPARENT`]. An elevation equal to the threshold stays dry.
//!
//! The output buffer is split into contiguous row bands rendered in parallel
//! on the rayon pool. Bands only read the shared [`ElevationGrid`] and only
//! write their own slice of the output, and `for_each` returns once every
//! band is done.

use image::RgbaImage;
use rayon::prelude::*;

use crate::error::{Result, TileError};
use crate::terrarium::{ElevationGrid, TILE_SIZE};

/// Color of pixels below sea level.
pub const SUBMERGED: [u8; 4] = [0, 50, 120, 255];

/// Color of pixels at or above sea level.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Default number of row bands per tile.
pub const DEFAULT_BANDS: usize = 8;

const BYTES_PER_PIXEL: usize = 4;

/// Number of rows in each band when `rows` are split into `bands` bands.
///
/// The last band takes the remainder, so the bands always cover every row.
/// A band count of 0 is treated as 1, and counts above `rows` as `rows`.
///
/// # Examples
///
/// ```
/// use sealevel::render::band_height;
///
/// assert_eq!(band_height(256, 8), 32);
/// assert_eq!(band_height(256, 3), 86); // 86 + 86 + 84
/// ```
pub fn band_height(rows: u32, bands: usize) -> u32 {
    let rows = rows.max(1);
    let bands = bands.clamp(1, rows as usize) as u32;
    rows.div_ceil(bands)
}

/// Render the sea-level mask for one tile.
///
/// Only the top-left 256×256 window of `grid` is used.
pub fn render_mask(grid: &ElevationGrid, threshold: i32, bands: usize) -> Result<RgbaImage> {
    let row_bytes = TILE_SIZE as usize * BYTES_PER_PIXEL;
    let band_rows = band_height(TILE_SIZE, bands) as usize;
    let mut pixels = vec![0u8; row_bytes * TILE_SIZE as usize];

    pixels
        .par_chunks_mut(band_rows * row_bytes)
        .enumerate()
        .for_each(|(band, chunk)| {
            let first_row = band * band_rows;
            for (offset, out_row) in chunk.chunks_exact_mut(row_bytes).enumerate() {
                let src = &grid.row((first_row + offset) as u32)[..TILE_SIZE as usize];
                classify_row(src, threshold, out_row);
            }
        });

    RgbaImage::from_raw(TILE_SIZE, TILE_SIZE, pixels).ok_or_else(|| TileError::Render {
        reason: "mask buffer does not match tile dimensions".to_string(),
    })
}

#[inline]
fn classify_row(elevations: &[i32], threshold: i32, out: &mut [u8]) {
    for (&elevation, pixel) in elevations.iter().zip(out.chunks_exact_mut(BYTES_PER_PIXEL)) {
        let color = if elevation < threshold {
            SUBMERGED
        } else {
            TRANSPARENT
        };
        pixel.copy_from_slice(&color);
    }
}
