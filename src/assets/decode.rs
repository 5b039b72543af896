use std::{path::Path, sync::Arc};

use image::imageops::FilterType;

use crate::{
    foundation::{
        core::Canvas,
        error::{GenError, GenResult},
    },
    render::composite::premultiply,
};

/// A layer normalized to the run's canvas.
#[derive(Clone, Debug)]
pub struct PreparedLayer {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedLayer {
    /// Horizontally flipped copy: pixel `(x, y)` comes from `(width - 1 - x, y)`.
    pub fn mirrored(&self) -> Self {
        let row_len = self.width as usize * 4;
        let mut out = Vec::with_capacity(self.rgba8_premul.len());
        for row in self.rgba8_premul.chunks_exact(row_len) {
            for px in row.chunks_exact(4).rev() {
                out.extend_from_slice(px);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            rgba8_premul: Arc::new(out),
        }
    }
}

pub fn load_layer(category: &str, path: &Path, canvas: Canvas) -> GenResult<PreparedLayer> {
    let bytes = std::fs::read(path).map_err(|e| GenError::decode(category, path, e))?;
    decode_layer(&bytes, canvas).map_err(|e| GenError::decode(category, path, e))
}

/// Decode, convert to RGBA8, premultiply, and resize to the canvas when the size differs.
pub fn decode_layer(bytes: &[u8], canvas: Canvas) -> Result<PreparedLayer, image::ImageError> {
    let mut rgba = image::load_from_memory(bytes)?.to_rgba8();
    for px in rgba.pixels_mut() {
        px.0 = premultiply(px.0);
    }

    // Resampled in premultiplied space.
    if rgba.dimensions() != (canvas.width, canvas.height) {
        rgba = image::imageops::resize(&rgba, canvas.width, canvas.height, FilterType::CatmullRom);
    }

    Ok(PreparedLayer {
        width: canvas.width,
        height: canvas.height,
        rgba8_premul: Arc::new(rgba.into_raw()),
    })
}
