//! Vector shapes kept editable on vector layers and rendered into the
//! layer's pixels with a one-pixel anti-aliased edge.

use model::{BlendMode, RasterBuffer, Rgba8, blend_pixel, unit_to_byte};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeStroke {
    pub color: Rgba8,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum VectorShape {
    Rectangle {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        #[serde(default)]
        fill: Option<Rgba8>,
        #[serde(default)]
        stroke: Option<ShapeStroke>,
    },
    Ellipse {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        #[serde(default)]
        fill: Option<Rgba8>,
        #[serde(default)]
        stroke: Option<ShapeStroke>,
    },
    Polyline {
        points: Vec<[f32; 2]>,
        #[serde(default)]
        closed: bool,
        #[serde(default)]
        fill: Option<Rgba8>,
        #[serde(default)]
        stroke: Option<ShapeStroke>,
    },
}

impl VectorShape {
    fn paint(&self) -> (Option<Rgba8>, Option<ShapeStroke>) {
        match self {
            VectorShape::Rectangle { fill, stroke, .. }
            | VectorShape::Ellipse { fill, stroke, .. }
            | VectorShape::Polyline { fill, stroke, .. } => (*fill, *stroke),
        }
    }

    /// Pixel bounds `(left, top, right, bottom)` including stroke width.
    fn bounds(&self) -> (f32, f32, f32, f32) {
        let pad = self.paint().1.map_or(0.0, |stroke| stroke.width * 0.5) + 1.0;
        let (left, top, right, bottom) = match self {
            VectorShape::Rectangle {
                x, y, width, height, ..
            } => (*x, *y, x + width, y + height),
            VectorShape::Ellipse { cx, cy, rx, ry, .. } => (cx - rx, cy - ry, cx + rx, cy + ry),
            VectorShape::Polyline { points, .. } => points.iter().fold(
                (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
                |(l, t, r, b), [x, y]| (l.min(*x), t.min(*y), r.max(*x), b.max(*y)),
            ),
        };
        (left - pad, top - pad, right + pad, bottom + pad)
    }

    /// Signed distance in pixels, negative inside. Open polylines have no
    /// inside and report the distance to the path.
    fn signed_distance(&self, px: f32, py: f32) -> f32 {
        match self {
            VectorShape::Rectangle {
                x, y, width, height, ..
            } => {
                let (hw, hh) = (width.abs() * 0.5, height.abs() * 0.5);
                let qx = (px - (x + width * 0.5)).abs() - hw;
                let qy = (py - (y + height * 0.5)).abs() - hh;
                let outside = qx.max(0.0).hypot(qy.max(0.0));
                outside + qx.max(qy).min(0.0)
            }
            VectorShape::Ellipse { cx, cy, rx, ry, .. } => {
                let (rx, ry) = (rx.abs().max(f32::EPSILON), ry.abs().max(f32::EPSILON));
                let k = ((px - cx) / rx).hypot((py - cy) / ry);
                (k - 1.0) * rx.min(ry)
            }
            VectorShape::Polyline { points, closed, .. } => {
                let distance = polyline_distance(points, *closed, px, py);
                if *closed && points.len() >= 3 && contains_even_odd(points, px, py) {
                    -distance
                } else {
                    distance
                }
            }
        }
    }
}

fn segment_distance(px: f32, py: f32, a: [f32; 2], b: [f32; 2]) -> f32 {
    let (abx, aby) = (b[0] - a[0], b[1] - a[1]);
    let length_sq = abx * abx + aby * aby;
    let t = if length_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - a[0]) * abx + (py - a[1]) * aby) / length_sq).clamp(0.0, 1.0)
    };
    (px - (a[0] + abx * t)).hypot(py - (a[1] + aby * t))
}

fn polyline_distance(points: &[[f32; 2]], closed: bool, px: f32, py: f32) -> f32 {
    match points {
        [] => f32::MAX,
        [only] => (px - only[0]).hypot(py - only[1]),
        _ => {
            let open = points
                .windows(2)
                .map(|pair| segment_distance(px, py, pair[0], pair[1]))
                .fold(f32::MAX, f32::min);
            if closed {
                open.min(segment_distance(px, py, points[points.len() - 1], points[0]))
            } else {
                open
            }
        }
    }
}

fn contains_even_odd(points: &[[f32; 2]], px: f32, py: f32) -> bool {
    let mut inside = false;
    let mut previous = points[points.len() - 1];
    for &current in points {
        if (current[1] > py) != (previous[1] > py) {
            let cross = previous[0]
                + (py - previous[1]) / (current[1] - previous[1]) * (current[0] - previous[0]);
            if px < cross {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

/// Clears `target` and draws `shape`: fill first, then stroke centered on
/// the outline.
pub fn render_vector_shape(target: &mut RasterBuffer, shape: &VectorShape) {
    target.clear();
    let (fill, stroke) = shape.paint();
    if fill.is_none() && stroke.is_none() {
        return;
    }
    let (width, height) = target.dimensions();
    let (left, top, right, bottom) = shape.bounds();
    let x0 = (left.floor().max(0.0) as u32).min(width);
    let y0 = (top.floor().max(0.0) as u32).min(height);
    let x1 = (right.ceil().max(0.0) as u32).min(width);
    let y1 = (bottom.ceil().max(0.0) as u32).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            let distance = shape.signed_distance(x as f32 + 0.5, y as f32 + 0.5);
            let mut pixel = Rgba8::TRANSPARENT;
            if let Some(color) = fill {
                let coverage = (0.5 - distance).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    let top = color.with_alpha(unit_to_byte(coverage * color.a as f32 / 255.0));
                    pixel = blend_pixel(pixel, top, BlendMode::Normal, 1.0);
                }
            }
            if let Some(stroke) = stroke {
                let coverage = (stroke.width * 0.5 - distance.abs() + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    let top = stroke
                        .color
                        .with_alpha(unit_to_byte(coverage * stroke.color.a as f32 / 255.0));
                    pixel = blend_pixel(pixel, top, BlendMode::Normal, 1.0);
                }
            }
            if pixel.a > 0 {
                target.set_pixel(x, y, pixel);
            }
        }
    }
}
