use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub const BYTES_PER_PIXEL: usize = 4;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RasterError {
    #[error("invalid raster dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("raster dimensions differ: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("pixel data length {actual} does not match {expected} bytes")]
    PixelDataLength { expected: usize, actual: usize },
    #[error("out of memory allocating {bytes} bytes of pixel data")]
    OutOfMemory { bytes: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const fn from_array(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    /// Parses `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits = text.strip_prefix('#').unwrap_or(text);
        let channel = |index: usize| u8::from_str_radix(digits.get(index..index + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::opaque(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Channel-wise mix towards white (`amount > 0`) or black (`amount < 0`).
    pub fn shade(self, amount: f32) -> Self {
        let amount = amount.clamp(-1.0, 1.0);
        let mix = |channel: u8| {
            let value = channel as f32;
            let target = if amount >= 0.0 { 255.0 } else { 0.0 };
            (value + (target - value) * amount.abs()).round() as u8
        };
        Self::new(mix(self.r), mix(self.g), mix(self.b), self.a)
    }
}

/// Owned RGBA8 pixel storage. Every allocation carries a process-unique
/// [`BufferId`]; a buffer recycled through a pool keeps its id.
#[derive(Debug)]
pub struct RasterBuffer {
    id: BufferId,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

fn checked_byte_len(width: u32, height: u32) -> Result<usize, RasterError> {
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|count| count.checked_mul(BYTES_PER_PIXEL))
        .ok_or(RasterError::InvalidDimensions { width, height })
}

fn allocate_zeroed(bytes: usize) -> Result<Vec<u8>, RasterError> {
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(bytes)
        .map_err(|_| RasterError::OutOfMemory { bytes })?;
    pixels.resize(bytes, 0);
    Ok(pixels)
}

impl RasterBuffer {
    /// Allocates a zero-initialized (fully transparent) buffer.
    pub fn new(width: u32, height: u32) -> Result<Self, RasterError> {
        let bytes = checked_byte_len(width, height)?;
        Ok(Self {
            id: BufferId::next(),
            width,
            height,
            pixels: allocate_zeroed(bytes)?,
        })
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        let expected = checked_byte_len(width, height)?;
        if pixels.len() != expected {
            return Err(RasterError::PixelDataLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            id: BufferId::next(),
            width,
            height,
            pixels,
        })
    }

    /// Deep copy into a fresh allocation with its own id.
    pub fn try_clone(&self) -> Result<Self, RasterError> {
        let mut pixels = allocate_zeroed(self.pixels.len())?;
        pixels.copy_from_slice(&self.pixels);
        Ok(Self {
            id: BufferId::next(),
            width: self.width,
            height: self.height,
            pixels,
        })
    }

    /// New allocation of the given size holding this buffer's pixels anchored
    /// at the top-left; uncovered area is transparent.
    pub fn resized_copy(&self, width: u32, height: u32) -> Result<Self, RasterError> {
        let mut resized = Self::new(width, height)?;
        let copy_width = self.width.min(width) as usize * BYTES_PER_PIXEL;
        for y in 0..self.height.min(height) {
            resized.row_mut(y)[..copy_width].copy_from_slice(&self.row(y)[..copy_width]);
        }
        Ok(resized)
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    fn row_stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.row_stride();
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.row_stride();
        let start = y as usize * stride;
        &mut self.pixels[start..start + stride]
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}x{} buffer",
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        let offset = self.offset(x, y);
        Rgba8::new(
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        )
    }

    pub fn get_pixel(&self, x: i64, y: i64) -> Option<Rgba8> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.pixel(x as u32, y as u32))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba8) {
        let offset = self.offset(x, y);
        self.pixels[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color.to_array());
    }

    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.pixels[self.offset(x, y) + 3]
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn clear_rows(&mut self, rows: Range<u32>) {
        let stride = self.row_stride();
        let end = rows.end.min(self.height) as usize * stride;
        let start = (rows.start as usize * stride).min(end);
        self.pixels[start..end].fill(0);
    }

    pub fn fill(&mut self, color: Rgba8) {
        let bytes = color.to_array();
        for pixel in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.copy_from_slice(&bytes);
        }
    }

    fn ensure_same_dimensions(&self, other: &RasterBuffer) -> Result<(), RasterError> {
        if self.dimensions() != other.dimensions() {
            return Err(RasterError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        Ok(())
    }

    pub fn copy_from(&mut self, other: &RasterBuffer) -> Result<(), RasterError> {
        self.ensure_same_dimensions(other)?;
        self.pixels.copy_from_slice(&other.pixels);
        Ok(())
    }

    pub fn copy_rows_from(
        &mut self,
        other: &RasterBuffer,
        rows: Range<u32>,
    ) -> Result<(), RasterError> {
        self.ensure_same_dimensions(other)?;
        let stride = self.row_stride();
        let end = rows.end.min(self.height) as usize * stride;
        let start = (rows.start as usize * stride).min(end);
        self.pixels[start..end].copy_from_slice(&other.pixels[start..end]);
        Ok(())
    }

    /// True when every pixel has zero alpha.
    pub fn is_transparent(&self) -> bool {
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .all(|pixel| pixel[3] == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_zeroed_and_sized() {
        let buffer = RasterBuffer::new(3, 2).expect("allocate buffer");
        assert_eq!(buffer.byte_len(), 24);
        assert!(buffer.as_bytes().iter().all(|byte| *byte == 0));
        assert!(buffer.is_transparent());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let error = RasterBuffer::new(0, 4).expect_err("zero width must fail");
        assert_eq!(
            error,
            RasterError::InvalidDimensions {
                width: 0,
                height: 4
            }
        );
    }

    #[test]
    fn every_allocation_gets_a_distinct_id() {
        let first = RasterBuffer::new(1, 1).expect("first");
        let second = RasterBuffer::new(1, 1).expect("second");
        let copy = first.try_clone().expect("clone");
        assert_ne!(first.id(), second.id());
        assert_ne!(first.id(), copy.id());
    }

    #[test]
    fn resized_copy_keeps_top_left_content() {
        let mut buffer = RasterBuffer::new(2, 2).expect("allocate");
        buffer.set_pixel(0, 0, Rgba8::opaque(10, 20, 30));
        buffer.set_pixel(1, 1, Rgba8::opaque(40, 50, 60));
        let grown = buffer.resized_copy(3, 1).expect("resize");
        assert_eq!(grown.pixel(0, 0), Rgba8::opaque(10, 20, 30));
        assert_eq!(grown.pixel(2, 0), Rgba8::TRANSPARENT);
        assert_eq!(grown.dimensions(), (3, 1));
    }

    #[test]
    fn copy_from_rejects_mismatched_dimensions() {
        let mut target = RasterBuffer::new(2, 2).expect("target");
        let source = RasterBuffer::new(3, 2).expect("source");
        assert!(matches!(
            target.copy_from(&source),
            Err(RasterError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn hex_colors_parse_with_and_without_alpha() {
        assert_eq!(Rgba8::from_hex("#ff8000"), Some(Rgba8::opaque(255, 128, 0)));
        assert_eq!(
            Rgba8::from_hex("10203040"),
            Some(Rgba8::new(0x10, 0x20, 0x30, 0x40))
        );
        assert_eq!(Rgba8::from_hex("#12"), None);
    }
}
