use std::f32::consts::{FRAC_PI_2, PI};
use std::ops::Range;

use model::{RasterBuffer, Rgba8, blend_pixel, erase_pixel, smoothstep, unit_to_byte};

use crate::settings::{BrushSettings, BrushShape, BrushTexture, PaintMode, TextureKind};

/// One shape impression placed along a stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamp {
    pub x: f32,
    pub y: f32,
    /// Diameter after dynamics.
    pub size: f32,
    /// Per-stamp alpha before shape and texture, `opacity * flow`.
    pub alpha: f32,
    pub angle_radians: f32,
}

const TRIANGLE_NORMALS: [[f32; 2]; 3] = [[0.0, 1.0], [-0.866_025_4, -0.5], [0.866_025_4, -0.5]];
const TRIANGLE_INRADIUS: f32 = 0.5;
const STAR_POINTS: f32 = 5.0;
const STAR_INNER_RADIUS: f32 = 0.5;

/// Distance from the shape center in units where the outline sits at 1.
/// `u`/`v` are stamp-local coordinates divided by the stamp radius.
pub fn shape_distance(shape: BrushShape, u: f32, v: f32) -> f32 {
    match shape {
        BrushShape::Circle => u.hypot(v),
        BrushShape::Square => u.abs().max(v.abs()),
        BrushShape::Diamond => u.abs() + v.abs(),
        BrushShape::Triangle => {
            TRIANGLE_NORMALS
                .iter()
                .map(|normal| normal[0] * u + normal[1] * v)
                .fold(f32::MIN, f32::max)
                / TRIANGLE_INRADIUS
        }
        BrushShape::Star => {
            let radius = u.hypot(v);
            if radius == 0.0 {
                return 0.0;
            }
            // Point up: rotate so the first tip lands on -y.
            let sector = 2.0 * PI / STAR_POINTS;
            let theta = (v.atan2(u) + FRAC_PI_2).rem_euclid(sector) / (sector * 0.5);
            let boundary = if theta < 1.0 {
                1.0 + (STAR_INNER_RADIUS - 1.0) * theta
            } else {
                STAR_INNER_RADIUS + (1.0 - STAR_INNER_RADIUS) * (theta - 1.0)
            };
            radius / boundary
        }
    }
}

/// Edge coverage for a normalized distance. Everything inside `hardness`
/// is solid; the rest falls off smoothly to the outline, which is
/// additionally anti-aliased over one pixel.
pub fn shape_coverage(distance: f32, hardness: f32, radius_pixels: f32) -> f32 {
    let falloff = 1.0 - smoothstep(hardness, 1.0, distance);
    let edge = ((1.0 - distance) * radius_pixels + 0.5).clamp(0.0, 1.0);
    falloff.min(edge)
}

fn lattice_hash(x: i32, y: i32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343) ^ (y as u32).wrapping_mul(0xd816_3841);
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^= h >> 15;
    (h & 0x00ff_ffff) as f32 / 0x0100_0000 as f32
}

fn value_noise(x: f32, y: f32) -> f32 {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i32, y0 as i32);
    let sx = fx * fx * (3.0 - 2.0 * fx);
    let sy = fy * fy * (3.0 - 2.0 * fy);
    let top = lattice_hash(ix, iy) + (lattice_hash(ix + 1, iy) - lattice_hash(ix, iy)) * sx;
    let bottom =
        lattice_hash(ix, iy + 1) + (lattice_hash(ix + 1, iy + 1) - lattice_hash(ix, iy + 1)) * sx;
    top + (bottom - top) * sy
}

/// Pattern value in `[0, 1]` at a canvas pixel.
pub fn texture_value(kind: TextureKind, x: f32, y: f32, scale: f32) -> f32 {
    match kind {
        TextureKind::Noise => value_noise(x / scale, y / scale),
        TextureKind::Bristle => value_noise(x / (scale * 8.0), y / scale * 2.0),
        TextureKind::Canvas => {
            let warp = (x * PI / scale).sin().abs();
            let weft = (y * PI / scale).sin().abs();
            0.4 + 0.6 * warp.max(weft)
        }
        TextureKind::Paper => {
            0.7 * value_noise(x / scale, y / scale)
                + 0.3 * lattice_hash(x.floor() as i32, y.floor() as i32)
        }
    }
}

fn texture_factor(texture: Option<&BrushTexture>, x: f32, y: f32) -> f32 {
    match texture {
        Some(texture) => {
            1.0 - texture.strength * (1.0 - texture_value(texture.kind, x, y, texture.scale))
        }
        None => 1.0,
    }
}

/// Draws one stamp and returns the rows it touched, if any.
pub fn render_stamp(
    target: &mut RasterBuffer,
    stamp: &Stamp,
    settings: &BrushSettings,
) -> Option<Range<u32>> {
    let radius = stamp.size * 0.5;
    if radius <= 0.0 || stamp.alpha <= 0.0 {
        return None;
    }
    let reach = radius * std::f32::consts::SQRT_2 + 1.0;
    let (width, height) = target.dimensions();
    let left = ((stamp.x - reach).floor() as i64).max(0);
    let top = ((stamp.y - reach).floor() as i64).max(0);
    let right = ((stamp.x + reach).ceil() as i64).min(width as i64);
    let bottom = ((stamp.y + reach).ceil() as i64).min(height as i64);
    if left >= right || top >= bottom {
        return None;
    }

    let (sin, cos) = (-stamp.angle_radians).sin_cos();
    let color_alpha = settings.color.a as f32 / 255.0;
    let mut touched: Option<Range<u32>> = None;
    for y in top..bottom {
        for x in left..right {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let dx = px - stamp.x;
            let dy = py - stamp.y;
            let u = (dx * cos - dy * sin) / radius;
            let v = (dx * sin + dy * cos) / radius;
            let distance = shape_distance(settings.shape, u, v);
            if distance >= 1.0 + 1.0 / radius {
                continue;
            }
            let coverage = shape_coverage(distance, settings.hardness, radius)
                * texture_factor(settings.texture.as_ref(), px, py);
            let alpha = coverage * stamp.alpha;
            if alpha <= 0.0 {
                continue;
            }

            let base = target.pixel(x as u32, y as u32);
            let painted = match settings.mode {
                PaintMode::Paint => {
                    let top_pixel: Rgba8 =
                        settings.color.with_alpha(unit_to_byte(alpha * color_alpha));
                    if top_pixel.a == 0 {
                        continue;
                    }
                    blend_pixel(base, top_pixel, settings.blend_mode, 1.0)
                }
                PaintMode::Erase => erase_pixel(base, alpha),
            };
            target.set_pixel(x as u32, y as u32, painted);
            let row = y as u32;
            touched = Some(match touched {
                Some(range) => range.start.min(row)..range.end.max(row + 1),
                None => row..row + 1,
            });
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_put_their_outline_at_one() {
        assert!((shape_distance(BrushShape::Circle, 0.6, 0.8) - 1.0).abs() < 1e-6);
        assert_eq!(shape_distance(BrushShape::Square, 1.0, 0.3), 1.0);
        assert_eq!(shape_distance(BrushShape::Diamond, 0.5, 0.5), 1.0);
        // Triangle apex points up (towards -y) with circumradius 1.
        assert!((shape_distance(BrushShape::Triangle, 0.0, -1.0) - 1.0).abs() < 1e-4);
        assert!((shape_distance(BrushShape::Triangle, 0.0, 0.5) - 1.0).abs() < 1e-4);
        // Star tip up, valley between tips at half radius.
        assert!((shape_distance(BrushShape::Star, 0.0, -1.0) - 1.0).abs() < 1e-4);
        let valley = -FRAC_PI_2 + PI / STAR_POINTS;
        let (s, c) = valley.sin_cos();
        assert!((shape_distance(BrushShape::Star, 0.5 * c, 0.5 * s) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn hard_brush_is_solid_inside_and_soft_brush_fades() {
        assert_eq!(shape_coverage(0.5, 1.0, 20.0), 1.0);
        assert_eq!(shape_coverage(1.2, 1.0, 20.0), 0.0);
        let soft_mid = shape_coverage(0.5, 0.0, 20.0);
        assert!(soft_mid > 0.0 && soft_mid < 1.0);
        assert!(shape_coverage(0.2, 0.0, 20.0) > soft_mid);
    }

    #[test]
    fn textures_stay_in_unit_range() {
        for kind in [
            TextureKind::Noise,
            TextureKind::Bristle,
            TextureKind::Canvas,
            TextureKind::Paper,
        ] {
            for index in 0..200 {
                let value = texture_value(kind, index as f32 * 1.37, index as f32 * 0.71, 4.0);
                assert!((0.0..=1.0).contains(&value), "{kind:?} {value}");
            }
        }
    }

    #[test]
    fn stamp_paints_center_and_reports_rows() {
        let mut target = RasterBuffer::new(20, 20).expect("alloc");
        let settings = BrushSettings {
            color: Rgba8::opaque(255, 0, 0),
            hardness: 1.0,
            ..BrushSettings::default()
        };
        let stamp = Stamp {
            x: 10.0,
            y: 10.0,
            size: 8.0,
            alpha: 1.0,
            angle_radians: 0.0,
        };
        let rows = render_stamp(&mut target, &stamp, &settings).expect("stamp on canvas");
        assert_eq!(target.pixel(10, 10), Rgba8::opaque(255, 0, 0));
        assert_eq!(target.alpha(0, 0), 0);
        assert!(rows.start >= 5 && rows.end <= 15);
    }

    #[test]
    fn erase_stamp_removes_alpha() {
        let mut target = RasterBuffer::new(10, 10).expect("alloc");
        target.fill(Rgba8::WHITE);
        let settings = BrushSettings {
            mode: PaintMode::Erase,
            hardness: 1.0,
            ..BrushSettings::default()
        };
        let stamp = Stamp {
            x: 5.0,
            y: 5.0,
            size: 6.0,
            alpha: 1.0,
            angle_radians: 0.0,
        };
        render_stamp(&mut target, &stamp, &settings).expect("erase");
        assert_eq!(target.alpha(5, 5), 0);
        assert_eq!(target.alpha(0, 0), 255);
    }
}
