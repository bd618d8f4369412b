//! Embroidery: freehand polylines become needle paths, and needle paths
//! are drawn as thread.

use std::ops::Range;

use model::{BlendMode, RasterBuffer, Rgba8, blend_pixel, unit_to_byte};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StitchType {
    #[default]
    #[serde(alias = "outline")]
    Running,
    Satin,
    Zigzag,
    DoubleSatin,
    Meander,
    Contour,
    Ripple,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadParams {
    pub color: Rgba8,
    /// Rendered thread width in pixels.
    pub thickness: f32,
    /// Needle step along the path in pixels, before density.
    pub stitch_length: f32,
    pub density: f32,
    /// Width of satin-like columns in pixels.
    pub width: f32,
    pub passes: u32,
}

impl Default for ThreadParams {
    fn default() -> Self {
        Self {
            color: Rgba8::opaque(200, 30, 60),
            thickness: 2.0,
            stitch_length: 6.0,
            density: 1.0,
            width: 8.0,
            passes: 1,
        }
    }
}

impl ThreadParams {
    pub fn needle_spacing(&self) -> f32 {
        let density = if self.density > 0.0 { self.density.max(0.25) } else { 1.0 };
        (self.stitch_length / density).max(1.0)
    }
}

type Point = [f32; 2];

/// Upper bound on the needle positions one plan produces.
pub const MAX_NEEDLE_POINTS: usize = 1 << 18;
const MAX_PASSES: u32 = 8;
const MAX_BANDS: i32 = 32;
/// Half of the widest thread drawn, in pixels.
const MAX_THREAD_HALF_WIDTH: f32 = 64.0;

/// Points every `spacing` pixels along the polyline, always including the
/// first and last input points. Very long paths get a wider spacing so the
/// result stays within [`MAX_NEEDLE_POINTS`].
pub fn resample_polyline(points: &[Point], spacing: f32) -> Vec<Point> {
    resample_within(points, spacing, MAX_NEEDLE_POINTS)
}

fn segment_length(from: Point, to: Point) -> f64 {
    (f64::from(to[0]) - f64::from(from[0])).hypot(f64::from(to[1]) - f64::from(from[1]))
}

fn resample_within(points: &[Point], spacing: f32, budget: usize) -> Vec<Point> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let total: f64 = points
        .windows(2)
        .map(|pair| segment_length(pair[0], pair[1]))
        .filter(|length| length.is_finite())
        .sum();
    let spacing = f64::from(spacing.max(1.0)).max(total / budget.max(1) as f64);
    let mut out = vec![points[0]];
    let mut carried = 0.0;
    for pair in points.windows(2) {
        let length = segment_length(pair[0], pair[1]);
        if !length.is_finite() || length <= 1e-6 {
            continue;
        }
        let first = spacing - carried;
        if first > length {
            carried += length;
            continue;
        }
        let (x0, y0) = (f64::from(pair[0][0]), f64::from(pair[0][1]));
        let ux = (f64::from(pair[1][0]) - x0) / length;
        let uy = (f64::from(pair[1][1]) - y0) / length;
        let count = ((length - first) / spacing).floor() as usize + 1;
        for index in 0..count {
            let along = first + index as f64 * spacing;
            out.push([(x0 + ux * along) as f32, (y0 + uy * along) as f32]);
        }
        carried = (length - first) % spacing;
    }
    let last = points[points.len() - 1];
    if out[out.len() - 1] != last {
        out.push(last);
    }
    out
}

fn normal_at(points: &[Point], index: usize) -> Point {
    let (a, b) = if index == 0 {
        (points[0], points[1])
    } else if index >= points.len() - 1 {
        (points[points.len() - 2], points[points.len() - 1])
    } else {
        (points[index - 1], points[index + 1])
    };
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let length = dx.hypot(dy);
    if length <= f32::EPSILON {
        return [0.0, 0.0];
    }
    [-dy / length, dx / length]
}

fn offset(point: Point, normal: Point, distance: f32) -> Point {
    [point[0] + normal[0] * distance, point[1] + normal[1] * distance]
}

/// Needle positions for the polyline in visiting order. Fewer than two
/// input points produce no stitches. Passes and fill bands are capped, and
/// the base path is resampled so the plan stays near [`MAX_NEEDLE_POINTS`].
pub fn plan_stitches(
    points: &[Point],
    stitch_type: StitchType,
    thread: &ThreadParams,
) -> Vec<Point> {
    if points.len() < 2 {
        return Vec::new();
    }
    let spacing = thread.needle_spacing();
    let width = thread.width.max(0.0);
    let half = width * 0.5;
    let bands = ((width.max(2.0) / spacing.max(1.0)).floor() as i32).clamp(1, MAX_BANDS);
    let passes = thread.passes.clamp(1, MAX_PASSES);
    let per_point = match stitch_type {
        StitchType::Satin => passes as usize,
        StitchType::DoubleSatin => 2,
        StitchType::Contour => bands as usize + 1,
        StitchType::Fill => 2 * bands as usize + 1,
        _ => 1,
    };
    let base = resample_within(points, spacing, MAX_NEEDLE_POINTS / per_point);
    let mut plan = Vec::with_capacity(base.len() * per_point);

    match stitch_type {
        StitchType::Running => plan.extend_from_slice(&base),
        StitchType::Satin => {
            let mut side = 1.0;
            for (index, &point) in base.iter().enumerate() {
                let normal = normal_at(&base, index);
                for pass in 0..passes {
                    let reach = width * (1.0 - pass as f32 / passes as f32) * 0.5;
                    plan.push(offset(point, normal, side * reach));
                }
                side = -side;
            }
        }
        StitchType::Zigzag => {
            let mut side = 1.0;
            for (index, &point) in base.iter().enumerate() {
                plan.push(offset(point, normal_at(&base, index), side * half));
                side = -side;
            }
        }
        StitchType::DoubleSatin => {
            for (index, &point) in base.iter().enumerate() {
                let normal = normal_at(&base, index);
                plan.push(offset(point, normal, width * 0.25));
                plan.push(offset(point, normal, -width * 0.5));
            }
        }
        StitchType::Meander => {
            let frequency = (2.0 / spacing).max(0.2);
            let mut phase = 0.0f32;
            for (index, &point) in base.iter().enumerate() {
                phase += frequency;
                plan.push(offset(point, normal_at(&base, index), phase.sin() * half));
            }
        }
        StitchType::Contour => {
            for (index, &point) in base.iter().enumerate() {
                let normal = normal_at(&base, index);
                for band in (-bands..=bands).step_by(2) {
                    plan.push(offset(point, normal, band as f32 / bands as f32 * half));
                }
            }
        }
        StitchType::Ripple => {
            let mut phase = 0.0f32;
            for (index, &point) in base.iter().enumerate() {
                phase += 0.5;
                let reach = (0.5 + 0.5 * phase.sin()) * half;
                plan.push(offset(point, normal_at(&base, index), reach));
            }
        }
        StitchType::Fill => {
            for (index, &point) in base.iter().enumerate() {
                let normal = normal_at(&base, index);
                for band in -bands..=bands {
                    plan.push(offset(point, normal, band as f32 / bands as f32 * half));
                }
            }
        }
    }
    plan
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b[0] - a[0], b[1] - a[1]);
    let length_sq = abx * abx + aby * aby;
    let t = if length_sq <= f32::EPSILON {
        0.0
    } else {
        (((p[0] - a[0]) * abx + (p[1] - a[1]) * aby) / length_sq).clamp(0.0, 1.0)
    };
    (p[0] - (a[0] + abx * t)).hypot(p[1] - (a[1] + aby * t))
}

/// Draws consecutive needle positions as thread: a body in the thread color
/// with a lighter center line. Returns the touched rows.
pub fn render_stitches(
    target: &mut RasterBuffer,
    needle_points: &[Point],
    thread: &ThreadParams,
) -> Option<Range<u32>> {
    if needle_points.len() < 2 {
        return None;
    }
    let half = (thread.thickness * 0.5).max(0.5).min(MAX_THREAD_HALF_WIDTH);
    let core = thread.color.shade(0.35);
    let (width, height) = target.dimensions();
    let mut touched: Option<Range<u32>> = None;

    for pair in needle_points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let left = ((a[0].min(b[0]) - half - 1.0).floor() as i64).max(0);
        let right = ((a[0].max(b[0]) + half + 1.0).ceil() as i64).min(width as i64);
        let top = ((a[1].min(b[1]) - half - 1.0).floor() as i64).max(0);
        let bottom = ((a[1].max(b[1]) + half + 1.0).ceil() as i64).min(height as i64);
        for y in top..bottom {
            for x in left..right {
                let distance = distance_to_segment([x as f32 + 0.5, y as f32 + 0.5], a, b);
                let coverage = (half - distance + 0.5).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let highlight = (1.0 - distance / half).clamp(0.0, 1.0);
                let color = if highlight > 0.6 { core } else { thread.color };
                let alpha = unit_to_byte(coverage * thread.color.a as f32 / 255.0);
                let top_pixel = color.with_alpha(alpha);
                let base = target.pixel(x as u32, y as u32);
                let blended = blend_pixel(base, top_pixel, BlendMode::Normal, 1.0);
                target.set_pixel(x as u32, y as u32, blended);
                let row = y as u32;
                touched = Some(match touched {
                    Some(range) => range.start.min(row)..range.end.max(row + 1),
                    None => row..row + 1,
                });
            }
        }
    }
    touched
}
