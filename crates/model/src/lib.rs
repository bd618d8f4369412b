//! Pixel-level primitives shared by every painting crate.
//!
//! All buffers are RGBA8 with straight (non-premultiplied) alpha, row-major,
//! four bytes per pixel and no row padding.

mod blend;
mod buffer;
mod dirty;
mod field;

pub use blend::{BlendMode, blend_buffer_rows, blend_pixel, blend_row, erase_pixel};
pub use buffer::{BYTES_PER_PIXEL, BufferId, RasterBuffer, RasterError, Rgba8};
pub use dirty::DirtyRows;
pub use field::{ScalarField, zeroed_plane};

/// Clamped conversion from a unit float to a channel byte.
#[inline]
pub fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[inline]
pub fn byte_to_unit(value: u8) -> f32 {
    value as f32 / 255.0
}

/// Hermite smoothstep between `edge0` and `edge1`.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
