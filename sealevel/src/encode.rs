//! PNG serialization of rendered masks.

use std::io::Cursor;

use bytes::Bytes;
use image::{ImageFormat, RgbaImage};

use crate::error::{Result, TileError};

/// Encode a rendered mask as PNG bytes.
pub fn encode_png(mask: &RgbaImage) -> Result<Bytes> {
    let mut buffer = Cursor::new(Vec::new());
    mask.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| TileError::Encode {
            reason: e.to_string(),
        })?;
    Ok(Bytes::from(buffer.into_inner()))
}
