use model::{RasterBuffer, Rgba8, unit_to_byte, zeroed_plane};
use serde::{Deserialize, Serialize};

use crate::EffectError;
use crate::blur::{alpha_plane, box_blur_plane};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowParams {
    pub offset_x: i32,
    pub offset_y: i32,
    pub blur_radius: u32,
    pub color: Rgba8,
    pub opacity: f32,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            offset_x: 4,
            offset_y: 4,
            blur_radius: 4,
            color: Rgba8::BLACK,
            opacity: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowParams {
    pub blur_radius: u32,
    pub color: Rgba8,
    pub opacity: f32,
}

impl Default for GlowParams {
    fn default() -> Self {
        Self {
            blur_radius: 6,
            color: Rgba8::opaque(255, 255, 160),
            opacity: 0.75,
        }
    }
}

/// Source alpha shifted by the offset, blurred and recolored.
pub fn drop_shadow(
    source: &RasterBuffer,
    params: &ShadowParams,
) -> Result<RasterBuffer, EffectError> {
    let (width, height) = source.dimensions();
    let alpha = alpha_plane(source)?;
    let mut shifted = zeroed_plane(alpha.len())?;
    for y in 0..height as i64 {
        let sy = y - params.offset_y as i64;
        if sy < 0 || sy >= height as i64 {
            continue;
        }
        for x in 0..width as i64 {
            let sx = x - params.offset_x as i64;
            if sx < 0 || sx >= width as i64 {
                continue;
            }
            shifted[(y * width as i64 + x) as usize] = alpha[(sy * width as i64 + sx) as usize];
        }
    }
    let blurred = box_blur_plane(&shifted, width as usize, height as usize, params.blur_radius)?;
    tint_plane(width, height, &blurred, params.color, params.opacity)
}

/// Blurred source alpha, recolored and scaled by opacity. The color channels
/// of the source are ignored.
pub fn outer_glow(source: &RasterBuffer, params: &GlowParams) -> Result<RasterBuffer, EffectError> {
    let (width, height) = source.dimensions();
    let blurred = box_blur_plane(
        &alpha_plane(source)?,
        width as usize,
        height as usize,
        params.blur_radius,
    )?;
    tint_plane(width, height, &blurred, params.color, params.opacity)
}

pub(crate) fn tint_plane(
    width: u32,
    height: u32,
    plane: &[f32],
    color: Rgba8,
    opacity: f32,
) -> Result<RasterBuffer, EffectError> {
    let mut output = RasterBuffer::new(width, height)?;
    let scale = opacity.clamp(0.0, 1.0) * (color.a as f32 / 255.0);
    for (pixel, coverage) in output.as_bytes_mut().chunks_exact_mut(4).zip(plane) {
        let alpha = unit_to_byte(coverage * scale);
        if alpha == 0 {
            continue;
        }
        pixel.copy_from_slice(&[color.r, color.g, color.b, alpha]);
    }
    Ok(output)
}
