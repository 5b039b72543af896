use std::{collections::HashMap, path::Path};

use crate::{
    assets::{
        decode::{PreparedLayer, load_layer},
        resolver::ResolvedLayers,
    },
    config::GenConfig,
    foundation::{
        core::Canvas,
        error::{GenError, GenResult},
    },
    generate::combination::GeneratedItem,
    render::composite::{over_in_place, unpremultiply_rgba8_in_place},
};

/// One entry of a bottom-to-top layer stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSource<'a> {
    pub category: &'a str,
    pub path: &'a Path,
    pub mirrored: bool,
}

/// Build the stack for an item from the configured slots.
pub fn layer_stack<'a>(
    item: &GeneratedItem,
    config: &'a GenConfig,
    resolved: &'a ResolvedLayers,
) -> GenResult<Vec<LayerSource<'a>>> {
    let mut stack = Vec::with_capacity(config.layers.len());
    for slot in &config.layers {
        let spec = config.category(&slot.category).ok_or_else(|| {
            GenError::validation(format!(
                "layer references unknown category '{}'",
                slot.category
            ))
        })?;
        let name = item.combination.get(&spec.key).ok_or_else(|| {
            GenError::validation(format!(
                "item {} has no trait for category '{}'",
                item.identifier, spec.key
            ))
        })?;
        let asset = resolved.get(&spec.table_type, name)?;
        stack.push(LayerSource {
            category: &spec.key,
            path: &asset.path,
            mirrored: slot.mirrored,
        });
    }
    Ok(stack)
}

/// Flattens layer stacks onto a fixed-size canvas.
///
/// Every source is normalized to the canvas before blending, so layers align pixel-for-pixel.
/// No randomness is involved: identical inputs give identical bytes.
#[derive(Clone, Copy, Debug)]
pub struct Compositor {
    canvas: Canvas,
}

impl Compositor {
    pub fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Decode and stack `layers` (bottom first), returning straight-alpha RGBA8.
    pub fn composite(&self, layers: &[LayerSource<'_>]) -> GenResult<image::RgbaImage> {
        let mut decoded = HashMap::<&Path, PreparedLayer>::new();
        let mut prepared = Vec::with_capacity(layers.len());
        for layer in layers {
            let base = match decoded.get(layer.path) {
                Some(l) => l.clone(),
                None => {
                    let l = load_layer(layer.category, layer.path, self.canvas)?;
                    decoded.insert(layer.path, l.clone());
                    l
                }
            };
            prepared.push(if layer.mirrored {
                base.mirrored()
            } else {
                base
            });
        }

        let mut data = self.stack_prepared(&prepared)?;
        unpremultiply_rgba8_in_place(&mut data);
        image::RgbaImage::from_raw(self.canvas.width, self.canvas.height, data)
            .ok_or_else(|| GenError::validation("composited buffer does not match canvas size"))
    }

    /// Blend already-normalized layers onto a transparent canvas; output stays premultiplied.
    pub fn stack_prepared(&self, layers: &[PreparedLayer]) -> GenResult<Vec<u8>> {
        let mut dst = vec![0u8; self.canvas.rgba_len()];
        for layer in layers {
            if (layer.width, layer.height) != (self.canvas.width, self.canvas.height) {
                return Err(GenError::validation(format!(
                    "layer is {}x{} but canvas is {}x{}",
                    layer.width, layer.height, self.canvas.width, self.canvas.height
                )));
            }
            over_in_place(&mut dst, &layer.rgba8_premul)?;
        }
        Ok(dst)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
