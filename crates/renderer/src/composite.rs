//! Tree walk that blends render nodes onto an accumulator, row span by row
//! span.

use std::ops::Range;

use effects::{LayerEffect, bevel, drop_shadow, emboss, outer_glow};
use model::{BYTES_PER_PIXEL, BlendMode, RasterBuffer, RasterError, blend_buffer_rows};
use render_protocol::RenderNode;

use crate::RenderError;

/// Reusable canvas-sized buffers for isolated group compositing.
#[derive(Debug, Default)]
pub(crate) struct ScratchBuffers {
    free: Vec<RasterBuffer>,
}

impl ScratchBuffers {
    fn take(&mut self, width: u32, height: u32) -> Result<RasterBuffer, RenderError> {
        match self
            .free
            .iter()
            .rposition(|buffer| buffer.dimensions() == (width, height))
        {
            Some(index) => Ok(self.free.swap_remove(index)),
            None => Ok(RasterBuffer::new(width, height)?),
        }
    }

    fn give_back(&mut self, buffer: RasterBuffer) {
        self.free.push(buffer);
    }

    pub(crate) fn clear(&mut self) {
        self.free.clear();
    }
}

pub(crate) fn composite_node(
    target: &mut RasterBuffer,
    node: &RenderNode<'_>,
    rows: &[Range<u32>],
    scratch: &mut ScratchBuffers,
) -> Result<(), RenderError> {
    match node {
        RenderNode::Leaf {
            buffer,
            mask,
            blend,
            opacity,
            effects,
            ..
        } => {
            if effects.is_empty() {
                for span in rows {
                    blend_buffer_rows(target, buffer, *mask, *blend, *opacity, span.clone())?;
                }
                Ok(())
            } else {
                composite_leaf_with_effects(target, buffer, *mask, *blend, *opacity, effects, rows)
            }
        }
        RenderNode::Group {
            blend,
            opacity,
            children,
            ..
        } => {
            if children.is_empty() || *opacity <= 0.0 {
                return Ok(());
            }
            let (width, height) = target.dimensions();
            let mut isolated = scratch.take(width, height)?;
            for span in rows {
                isolated.clear_rows(span.clone());
            }
            for child in children {
                composite_node(&mut isolated, child, rows, scratch)?;
            }
            for span in rows {
                blend_buffer_rows(target, &isolated, None, *blend, *opacity, span.clone())?;
            }
            scratch.give_back(isolated);
            Ok(())
        }
    }
}

/// Effects read the layer as it will be seen, so a mask is baked into a
/// copy before any effect sees the pixels.
fn composite_leaf_with_effects(
    target: &mut RasterBuffer,
    buffer: &RasterBuffer,
    mask: Option<&RasterBuffer>,
    blend: BlendMode,
    opacity: f32,
    effects: &[LayerEffect],
    rows: &[Range<u32>],
) -> Result<(), RenderError> {
    let masked;
    let source = match mask {
        Some(mask) => {
            masked = apply_mask(buffer, mask)?;
            &masked
        }
        None => buffer,
    };

    for effect in effects.iter().filter(|effect| effect.is_underlay()) {
        let underlay = match effect {
            LayerEffect::DropShadow(params) => drop_shadow(source, params)?,
            LayerEffect::OuterGlow(params) => outer_glow(source, params)?,
            LayerEffect::Bevel(_) | LayerEffect::Emboss(_) => continue,
        };
        for span in rows {
            blend_buffer_rows(target, &underlay, None, BlendMode::Normal, opacity, span.clone())?;
        }
    }

    for span in rows {
        blend_buffer_rows(target, source, None, blend, opacity, span.clone())?;
    }

    for effect in effects.iter().filter(|effect| !effect.is_underlay()) {
        let shading = match effect {
            LayerEffect::Bevel(params) => bevel(source, params)?,
            LayerEffect::Emboss(params) => emboss(source, params)?,
            LayerEffect::DropShadow(_) | LayerEffect::OuterGlow(_) => continue,
        };
        for span in rows {
            let (highlight, shadow) = (&shading.highlight, &shading.shadow);
            blend_buffer_rows(target, highlight, None, BlendMode::Screen, opacity, span.clone())?;
            blend_buffer_rows(target, shadow, None, BlendMode::Multiply, opacity, span.clone())?;
        }
    }
    Ok(())
}

/// Copy of `buffer` with its alpha scaled by the mask's alpha.
pub fn apply_mask(buffer: &RasterBuffer, mask: &RasterBuffer) -> Result<RasterBuffer, RenderError> {
    if mask.dimensions() != buffer.dimensions() {
        return Err(RasterError::DimensionMismatch {
            expected: buffer.dimensions(),
            actual: mask.dimensions(),
        }
        .into());
    }
    let mut masked = buffer.try_clone()?;
    for (pixel, mask_pixel) in masked
        .as_bytes_mut()
        .chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(mask.as_bytes().chunks_exact(BYTES_PER_PIXEL))
    {
        pixel[3] = ((pixel[3] as u16 * mask_pixel[3] as u16 + 127) / 255) as u8;
    }
    Ok(masked)
}
