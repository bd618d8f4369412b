use model::{RasterBuffer, Rgba8, byte_to_unit, zeroed_plane};
use serde::{Deserialize, Serialize};

use crate::EffectError;
use crate::blur::{alpha_plane, box_blur_plane};
use crate::shadow::tint_plane;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BevelParams {
    /// Light azimuth, counter-clockwise from +x with y pointing down.
    pub angle_degrees: f32,
    pub altitude_degrees: f32,
    pub depth: f32,
    /// Blur radius applied to the alpha channel to form the height field.
    pub size: u32,
    pub highlight_color: Rgba8,
    pub shadow_color: Rgba8,
    pub opacity: f32,
}

impl Default for BevelParams {
    fn default() -> Self {
        Self {
            angle_degrees: 120.0,
            altitude_degrees: 30.0,
            depth: 3.0,
            size: 3,
            highlight_color: Rgba8::WHITE,
            shadow_color: Rgba8::BLACK,
            opacity: 0.75,
        }
    }
}

#[derive(Debug)]
pub struct BevelOutput {
    pub highlight: RasterBuffer,
    pub shadow: RasterBuffer,
}

/// Lit-normal shading clipped to the source's alpha.
pub fn bevel(source: &RasterBuffer, params: &BevelParams) -> Result<BevelOutput, EffectError> {
    shade(source, params, true)
}

/// Same shading as [`bevel`] but left unclipped, so the relief also shows
/// around the source footprint.
pub fn emboss(source: &RasterBuffer, params: &BevelParams) -> Result<BevelOutput, EffectError> {
    shade(source, params, false)
}

fn shade(
    source: &RasterBuffer,
    params: &BevelParams,
    clip: bool,
) -> Result<BevelOutput, EffectError> {
    let (width, height) = source.dimensions();
    let (w, h) = (width as usize, height as usize);
    let heights = box_blur_plane(&alpha_plane(source)?, w, h, params.size)?;
    let light = light_vector(params.angle_degrees, params.altitude_degrees);

    let mut highlight = zeroed_plane(heights.len())?;
    let mut shadow = zeroed_plane(heights.len())?;
    let at = |x: i64, y: i64| -> f32 {
        let x = x.clamp(0, w as i64 - 1) as usize;
        let y = y.clamp(0, h as i64 - 1) as usize;
        heights[y * w + x]
    };

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let dx = (at(x + 1, y) - at(x - 1, y)) * 0.5 * params.depth;
            let dy = (at(x, y + 1) - at(x, y - 1)) * 0.5 * params.depth;
            let normal = normalize([-dx, -dy, 1.0]);
            let lambert = normal[0] * light[0] + normal[1] * light[1] + normal[2] * light[2];
            // Flat surface maps to exactly 0.5.
            let intensity = (0.5 + (lambert - light[2])).clamp(0.0, 1.0);

            let index = y as usize * w + x as usize;
            let clip_factor = if clip {
                byte_to_unit(source.alpha(x as u32, y as u32))
            } else {
                1.0
            };
            if intensity > 0.5 {
                highlight[index] = (intensity - 0.5) * 2.0 * clip_factor;
            } else {
                shadow[index] = (0.5 - intensity) * 2.0 * clip_factor;
            }
        }
    }

    Ok(BevelOutput {
        highlight: tint_plane(width, height, &highlight, params.highlight_color, params.opacity)?,
        shadow: tint_plane(width, height, &shadow, params.shadow_color, params.opacity)?,
    })
}

fn light_vector(angle_degrees: f32, altitude_degrees: f32) -> [f32; 3] {
    let azimuth = angle_degrees.to_radians();
    let altitude = altitude_degrees.clamp(0.0, 90.0).to_radians();
    [
        altitude.cos() * azimuth.cos(),
        -altitude.cos() * azimuth.sin(),
        altitude.sin(),
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length <= f32::EPSILON {
        return [0.0, 0.0, 1.0];
    }
    [v[0] / length, v[1] / length, v[2] / length]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: u32, inset: u32) -> RasterBuffer {
        let mut buffer = RasterBuffer::new(size, size).expect("alloc");
        for y in inset..size - inset {
            for x in inset..size - inset {
                buffer.set_pixel(x, y, Rgba8::opaque(90, 90, 90));
            }
        }
        buffer
    }

    #[test]
    fn flat_surface_lands_in_shadow_branch_with_zero_strength() {
        let mut source = RasterBuffer::new(6, 6).expect("alloc");
        source.fill(Rgba8::WHITE);
        let output = bevel(&source, &BevelParams::default()).expect("bevel");
        assert!(output.highlight.is_transparent());
        assert!(output.shadow.is_transparent());
    }

    #[test]
    fn edges_facing_light_are_highlighted() {
        let source = square(16, 4);
        let params = BevelParams {
            angle_degrees: 180.0,
            altitude_degrees: 30.0,
            size: 2,
            ..BevelParams::default()
        };
        let output = bevel(&source, &params).expect("bevel");
        // Light comes from -x: the left edge rises towards the light.
        assert!(output.highlight.alpha(4, 8) > 0);
        assert_eq!(output.shadow.alpha(4, 8), 0);
        assert!(output.shadow.alpha(11, 8) > 0);
    }

    #[test]
    fn bevel_is_clipped_but_emboss_is_not() {
        let source = square(16, 4);
        let params = BevelParams {
            angle_degrees: 180.0,
            size: 2,
            ..BevelParams::default()
        };
        let clipped = bevel(&source, &params).expect("bevel");
        let open = emboss(&source, &params).expect("emboss");
        assert_eq!(clipped.highlight.alpha(3, 8), 0);
        assert!(open.highlight.alpha(3, 8) > 0);
    }
}
