use std::ops::Range;

use model::{BlendMode, RasterBuffer, Rgba8, blend_pixel, unit_to_byte, zeroed_plane};
use serde::{Deserialize, Serialize};

use crate::EffectError;
use crate::blur::box_blur_plane;

/// Radial opacity falloff of a puff dab as `(distance / radius, opacity)`.
pub const PUFF_FALLOFF_STOPS: [(f32, f32); 4] = [(0.0, 1.0), (0.4, 0.7), (0.75, 0.3), (1.0, 0.0)];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PuffDab {
    pub x: f32,
    pub y: f32,
    /// Diameter in pixels.
    pub size: f32,
    pub opacity: f32,
    pub color: Rgba8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuffStyle {
    pub max_opacity: f32,
    pub blur_radius: u32,
}

impl Default for PuffStyle {
    fn default() -> Self {
        Self {
            max_opacity: 0.9,
            blur_radius: 1,
        }
    }
}

pub fn puff_falloff(t: f32) -> f32 {
    if t <= 0.0 {
        return PUFF_FALLOFF_STOPS[0].1;
    }
    for pair in PUFF_FALLOFF_STOPS.windows(2) {
        let ((t0, v0), (t1, v1)) = (pair[0], pair[1]);
        if t <= t1 {
            return v0 + (v1 - v0) * (t - t0) / (t1 - t0);
        }
    }
    0.0
}

/// Stamps one puff dab onto `target` and returns the rows it touched.
///
/// The dab is rendered into a local coverage grid, softened by a small blur,
/// then composited with normal blending. Resulting alpha never rises above
/// `style.max_opacity` unless the target was already more opaque, so piling
/// dabs on the same spot saturates at the cap.
///
/// Only the part of the dab that lands on the canvas is rasterized, so the
/// work is bounded by the canvas size however large the dab is. Dabs with a
/// non-finite position or size touch nothing.
pub fn stamp_puff_dab(
    target: &mut RasterBuffer,
    dab: &PuffDab,
    style: &PuffStyle,
) -> Result<Option<Range<u32>>, EffectError> {
    if !(dab.x.is_finite() && dab.y.is_finite() && dab.size.is_finite()) {
        return Ok(None);
    }
    let radius = (dab.size * 0.5).max(0.5);
    let blur = style.blur_radius as i64;
    let reach = f64::from(radius).ceil() + blur as f64 + 1.0;
    let (width, height) = target.dimensions();
    let (Some((clip_left, clip_right)), Some((clip_top, clip_bottom))) =
        (clip_span(dab.x, reach, width), clip_span(dab.y, reach, height))
    else {
        return Ok(None);
    };

    // Clipped area plus the blur margin, so blurred values inside the clip
    // match an unclipped render.
    let left = clip_left - blur;
    let top = clip_top - blur;
    let grid_width = (clip_right - clip_left + 2 * blur) as usize;
    let grid_height = (clip_bottom - clip_top + 2 * blur) as usize;
    let mut coverage = zeroed_plane(grid_width.saturating_mul(grid_height))?;
    for gy in 0..grid_height {
        for gx in 0..grid_width {
            let px = (left + gx as i64) as f32 + 0.5;
            let py = (top + gy as i64) as f32 + 0.5;
            let distance = (px - dab.x).hypot(py - dab.y);
            coverage[gy * grid_width + gx] = puff_falloff(distance / radius);
        }
    }
    let coverage = box_blur_plane(&coverage, grid_width, grid_height, style.blur_radius)?;

    let strength = dab.opacity.clamp(0.0, 1.0) * (dab.color.a as f32 / 255.0);
    let cap = unit_to_byte(style.max_opacity);
    for y in clip_top..clip_bottom {
        for x in clip_left..clip_right {
            let local = (y - top) as usize * grid_width + (x - left) as usize;
            let alpha = unit_to_byte(coverage[local] * strength);
            if alpha == 0 {
                continue;
            }
            let base = target.pixel(x as u32, y as u32);
            let mut out = blend_pixel(base, dab.color.with_alpha(alpha), BlendMode::Normal, 1.0);
            out.a = out.a.min(cap.max(base.a));
            target.set_pixel(x as u32, y as u32, out);
        }
    }
    Ok(Some(clip_top as u32..clip_bottom as u32))
}

/// Pixel span `[start, end)` of the dab square around `center` that lies
/// inside `0..limit`.
fn clip_span(center: f32, reach: f64, limit: u32) -> Option<(i64, i64)> {
    let origin = f64::from(center).floor();
    let start = (origin - reach).max(0.0);
    let end = (origin + reach + 1.0).min(f64::from(limit));
    (start < end).then_some((start as i64, end as i64))
}
