use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{BYTES_PER_PIXEL, RasterBuffer, RasterError, Rgba8, byte_to_unit, unit_to_byte};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
    HardLight,
    ColorDodge,
    ColorBurn,
    Darken,
    Lighten,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    pub const ALL: [BlendMode; 16] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::SoftLight,
        BlendMode::HardLight,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::Difference,
        BlendMode::Exclusion,
        BlendMode::Hue,
        BlendMode::Saturation,
        BlendMode::Color,
        BlendMode::Luminosity,
    ];

    pub fn is_separable(self) -> bool {
        !matches!(
            self,
            BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity
        )
    }

    /// Blend function `B(backdrop, source)` over unit RGB.
    fn mix(self, backdrop: [f32; 3], source: [f32; 3]) -> [f32; 3] {
        match self {
            BlendMode::Hue => set_lum(set_sat(source, sat(backdrop)), lum(backdrop)),
            BlendMode::Saturation => set_lum(set_sat(backdrop, sat(source)), lum(backdrop)),
            BlendMode::Color => set_lum(source, lum(backdrop)),
            BlendMode::Luminosity => set_lum(backdrop, lum(source)),
            separable => [
                separable.channel(backdrop[0], source[0]),
                separable.channel(backdrop[1], source[1]),
                separable.channel(backdrop[2], source[2]),
            ],
        }
    }

    fn channel(self, backdrop: f32, source: f32) -> f32 {
        match self {
            BlendMode::Normal => source,
            BlendMode::Multiply => backdrop * source,
            BlendMode::Screen => backdrop + source - backdrop * source,
            BlendMode::Overlay => hard_light(source, backdrop),
            BlendMode::HardLight => hard_light(backdrop, source),
            BlendMode::SoftLight => soft_light(backdrop, source),
            BlendMode::ColorDodge => {
                if backdrop <= 0.0 {
                    0.0
                } else if source >= 1.0 {
                    1.0
                } else {
                    (backdrop / (1.0 - source)).min(1.0)
                }
            }
            BlendMode::ColorBurn => {
                if backdrop >= 1.0 {
                    1.0
                } else if source <= 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - backdrop) / source).min(1.0)
                }
            }
            BlendMode::Darken => backdrop.min(source),
            BlendMode::Lighten => backdrop.max(source),
            BlendMode::Difference => (backdrop - source).abs(),
            BlendMode::Exclusion => backdrop + source - 2.0 * backdrop * source,
            BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => {
                unreachable!("non-separable blend modes are mixed per pixel")
            }
        }
    }
}

fn hard_light(backdrop: f32, source: f32) -> f32 {
    if source <= 0.5 {
        backdrop * 2.0 * source
    } else {
        let doubled = 2.0 * source - 1.0;
        backdrop + doubled - backdrop * doubled
    }
}

fn soft_light(backdrop: f32, source: f32) -> f32 {
    if source <= 0.5 {
        backdrop - (1.0 - 2.0 * source) * backdrop * (1.0 - backdrop)
    } else {
        let d = if backdrop <= 0.25 {
            ((16.0 * backdrop - 12.0) * backdrop + 4.0) * backdrop
        } else {
            backdrop.sqrt()
        };
        backdrop + (2.0 * source - 1.0) * (d - backdrop)
    }
}

fn lum(color: [f32; 3]) -> f32 {
    0.3 * color[0] + 0.59 * color[1] + 0.11 * color[2]
}

fn clip_color(color: [f32; 3]) -> [f32; 3] {
    let l = lum(color);
    let n = color[0].min(color[1]).min(color[2]);
    let x = color[0].max(color[1]).max(color[2]);
    let mut out = color;
    if n < 0.0 && l - n > f32::EPSILON {
        for channel in &mut out {
            *channel = l + (*channel - l) * l / (l - n);
        }
    }
    if x > 1.0 && x - l > f32::EPSILON {
        for channel in &mut out {
            *channel = l + (*channel - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

fn set_lum(color: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(color);
    clip_color([color[0] + d, color[1] + d, color[2] + d])
}

fn sat(color: [f32; 3]) -> f32 {
    color[0].max(color[1]).max(color[2]) - color[0].min(color[1]).min(color[2])
}

fn set_sat(color: [f32; 3], s: f32) -> [f32; 3] {
    let max = color[0].max(color[1]).max(color[2]);
    let min = color[0].min(color[1]).min(color[2]);
    if max - min <= f32::EPSILON {
        return [0.0; 3];
    }
    let scale = |channel: f32| (channel - min) * s / (max - min);
    [scale(color[0]), scale(color[1]), scale(color[2])]
}

/// Composites `top` over `base`: the blend function is applied where the
/// backdrop exists, then the result is combined with Porter-Duff source-over.
/// `opacity` scales the source alpha and is clamped to `[0, 1]`.
pub fn blend_pixel(base: Rgba8, top: Rgba8, mode: BlendMode, opacity: f32) -> Rgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if top.a == 0 || opacity <= 0.0 {
        return base;
    }
    if mode == BlendMode::Normal && opacity >= 1.0 && top.a == 255 {
        return top;
    }

    let source_alpha = byte_to_unit(top.a) * opacity;
    let backdrop_alpha = byte_to_unit(base.a);
    let source = [byte_to_unit(top.r), byte_to_unit(top.g), byte_to_unit(top.b)];
    let backdrop = [
        byte_to_unit(base.r),
        byte_to_unit(base.g),
        byte_to_unit(base.b),
    ];

    let mixed = if mode == BlendMode::Normal || backdrop_alpha <= 0.0 {
        source
    } else {
        let blended = mode.mix(backdrop, source);
        [
            (1.0 - backdrop_alpha) * source[0] + backdrop_alpha * blended[0],
            (1.0 - backdrop_alpha) * source[1] + backdrop_alpha * blended[1],
            (1.0 - backdrop_alpha) * source[2] + backdrop_alpha * blended[2],
        ]
    };

    let out_alpha = source_alpha + backdrop_alpha * (1.0 - source_alpha);
    if out_alpha <= 0.0 {
        return Rgba8::TRANSPARENT;
    }
    let channel = |index: usize| {
        unit_to_byte(
            (mixed[index] * source_alpha + backdrop[index] * backdrop_alpha * (1.0 - source_alpha))
                / out_alpha,
        )
    };
    Rgba8::new(channel(0), channel(1), channel(2), unit_to_byte(out_alpha))
}

/// Destination-out: removes `amount` of the base alpha.
pub fn erase_pixel(base: Rgba8, amount: f32) -> Rgba8 {
    let amount = amount.clamp(0.0, 1.0);
    if amount <= 0.0 || base.a == 0 {
        return base;
    }
    let alpha = byte_to_unit(base.a) * (1.0 - amount);
    if alpha <= 0.0 {
        return Rgba8::TRANSPARENT;
    }
    base.with_alpha(unit_to_byte(alpha))
}

/// Blends one row of source pixels onto a destination row of equal length.
/// `mask` holds RGBA pixels whose alpha scales the source alpha.
pub fn blend_row(
    destination: &mut [u8],
    source: &[u8],
    mask: Option<&[u8]>,
    mode: BlendMode,
    opacity: f32,
) {
    debug_assert_eq!(destination.len(), source.len());
    for (index, (dst, src)) in destination
        .chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(source.chunks_exact(BYTES_PER_PIXEL))
        .enumerate()
    {
        if src[3] == 0 {
            continue;
        }
        let mut top = Rgba8::new(src[0], src[1], src[2], src[3]);
        if let Some(mask) = mask {
            let mask_alpha = mask[index * BYTES_PER_PIXEL + 3];
            if mask_alpha == 0 {
                continue;
            }
            top.a = ((top.a as u16 * mask_alpha as u16 + 127) / 255) as u8;
        }
        let base = Rgba8::new(dst[0], dst[1], dst[2], dst[3]);
        dst.copy_from_slice(&blend_pixel(base, top, mode, opacity).to_array());
    }
}

/// Blends `rows` of `source` onto `destination`. All buffers must share
/// dimensions.
pub fn blend_buffer_rows(
    destination: &mut RasterBuffer,
    source: &RasterBuffer,
    mask: Option<&RasterBuffer>,
    mode: BlendMode,
    opacity: f32,
    rows: Range<u32>,
) -> Result<(), RasterError> {
    for other in std::iter::once(source).chain(mask) {
        if other.dimensions() != destination.dimensions() {
            return Err(RasterError::DimensionMismatch {
                expected: destination.dimensions(),
                actual: other.dimensions(),
            });
        }
    }
    let end = rows.end.min(destination.height());
    for y in rows.start.min(end)..end {
        blend_row(
            destination.row_mut(y),
            source.row(y),
            mask.map(|mask| mask.row(y)),
            mode,
            opacity,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Rgba8, expected: Rgba8, tolerance: u8) {
        let pairs = [
            (actual.r, expected.r),
            (actual.g, expected.g),
            (actual.b, expected.b),
            (actual.a, expected.a),
        ];
        for (a, e) in pairs {
            assert!(
                a.abs_diff(e) <= tolerance,
                "expected {expected:?}, got {actual:?}"
            );
        }
    }

    #[test]
    fn normal_half_opacity_mixes_evenly() {
        let red = Rgba8::opaque(255, 0, 0);
        let blue = Rgba8::opaque(0, 0, 255);
        let out = blend_pixel(red, blue, BlendMode::Normal, 0.5);
        assert_close(out, Rgba8::new(127, 0, 127, 255), 1);
    }

    #[test]
    fn opaque_normal_replaces_base() {
        let out = blend_pixel(
            Rgba8::opaque(1, 2, 3),
            Rgba8::opaque(9, 8, 7),
            BlendMode::Normal,
            1.0,
        );
        assert_eq!(out, Rgba8::opaque(9, 8, 7));
    }

    #[test]
    fn multiply_and_screen_follow_standard_formulas() {
        let base = Rgba8::opaque(128, 255, 0);
        let top = Rgba8::opaque(128, 128, 128);
        assert_close(
            blend_pixel(base, top, BlendMode::Multiply, 1.0),
            Rgba8::opaque(64, 128, 0),
            1,
        );
        assert_close(
            blend_pixel(base, top, BlendMode::Screen, 1.0),
            Rgba8::opaque(192, 255, 128),
            1,
        );
    }

    #[test]
    fn blend_over_transparent_backdrop_ignores_mode() {
        let top = Rgba8::opaque(200, 100, 50);
        for mode in BlendMode::ALL {
            assert_eq!(blend_pixel(Rgba8::TRANSPARENT, top, mode, 1.0), top);
        }
    }

    #[test]
    fn luminosity_keeps_backdrop_hue() {
        let base = Rgba8::opaque(255, 0, 0);
        let top = Rgba8::opaque(255, 255, 255);
        let out = blend_pixel(base, top, BlendMode::Luminosity, 1.0);
        assert_eq!(out.a, 255);
        assert!(out.r >= out.g && out.r >= out.b);
    }

    #[test]
    fn erase_removes_alpha_proportionally() {
        let out = erase_pixel(Rgba8::opaque(10, 10, 10), 0.5);
        assert_close(out, Rgba8::new(10, 10, 10, 128), 1);
        assert_eq!(
            erase_pixel(Rgba8::opaque(10, 10, 10), 1.0),
            Rgba8::TRANSPARENT
        );
    }

    #[test]
    fn mask_alpha_scales_source() {
        let mut destination = vec![0u8; 4];
        let source = [255u8, 255, 255, 255];
        let mask = [0u8, 0, 0, 0];
        blend_row(&mut destination, &source, Some(&mask), BlendMode::Normal, 1.0);
        assert_eq!(destination, vec![0, 0, 0, 0]);
    }
}
