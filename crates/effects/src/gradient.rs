use std::f32::consts::TAU;

use model::{RasterBuffer, Rgba8};
use serde::{Deserialize, Serialize};

use crate::EffectError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradientKind {
    Linear { start: [f32; 2], end: [f32; 2] },
    Radial { center: [f32; 2], radius: f32 },
    Conic { center: [f32; 2], angle_degrees: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Rgba8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientSpec {
    pub kind: GradientKind,
    pub stops: Vec<GradientStop>,
}

/// Gradient sized like `source`; the source pixels are not read.
pub fn gradient(source: &RasterBuffer, spec: &GradientSpec) -> Result<RasterBuffer, EffectError> {
    render_gradient(source.width(), source.height(), spec)
}

pub fn render_gradient(
    width: u32,
    height: u32,
    spec: &GradientSpec,
) -> Result<RasterBuffer, EffectError> {
    if spec.stops.is_empty() {
        return Err(EffectError::EmptyGradient);
    }
    let mut stops = spec.stops.clone();
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    let mut output = RasterBuffer::new(width, height)?;
    for y in 0..height {
        let row = output.row_mut(y);
        for x in 0..width {
            let t = ramp_position(&spec.kind, x as f32 + 0.5, y as f32 + 0.5);
            let color = sample_stops(&stops, t);
            let offset = x as usize * 4;
            row[offset..offset + 4].copy_from_slice(&color.to_array());
        }
    }
    Ok(output)
}

fn ramp_position(kind: &GradientKind, px: f32, py: f32) -> f32 {
    match *kind {
        GradientKind::Linear { start, end } => {
            let axis = [end[0] - start[0], end[1] - start[1]];
            let length_sq = axis[0] * axis[0] + axis[1] * axis[1];
            if length_sq <= f32::EPSILON {
                return 0.0;
            }
            (((px - start[0]) * axis[0] + (py - start[1]) * axis[1]) / length_sq).clamp(0.0, 1.0)
        }
        GradientKind::Radial { center, radius } => {
            if radius <= 0.0 {
                return 1.0;
            }
            let distance = ((px - center[0]).powi(2) + (py - center[1]).powi(2)).sqrt();
            (distance / radius).clamp(0.0, 1.0)
        }
        GradientKind::Conic { center, angle_degrees } => {
            let angle = (py - center[1]).atan2(px - center[0]) - angle_degrees.to_radians();
            angle.rem_euclid(TAU) / TAU
        }
    }
}

fn sample_stops(stops: &[GradientStop], t: f32) -> Rgba8 {
    let first = stops[0];
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let f = if span <= f32::EPSILON { 1.0 } else { (t - a.offset) / span };
            return lerp_color(a.color, b.color, f);
        }
    }
    stops[stops.len() - 1].color
}

fn lerp_color(a: Rgba8, b: Rgba8, t: f32) -> Rgba8 {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8;
    Rgba8::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), mix(a.a, b.a))
}
