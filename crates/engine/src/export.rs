//! PNG encoding of engine buffers.

use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma, RgbaImage};
use model::{RasterBuffer, ScalarField};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("pixel data does not match {width}x{height}")]
    Layout { width: u32, height: u32 },
    #[error(transparent)]
    Encode(#[from] image::ImageError),
}

/// Straight-alpha RGBA PNG of `buffer`.
pub fn encode_png(buffer: &RasterBuffer) -> Result<Vec<u8>, ExportError> {
    let (width, height) = buffer.dimensions();
    let image = RgbaImage::from_raw(width, height, buffer.as_bytes().to_vec())
        .ok_or(ExportError::Layout { width, height })?;
    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, ImageFormat::Png)?;
    Ok(encoded.into_inner())
}

/// 8-bit grayscale PNG of a `[0, 1]` field.
pub fn encode_field_png(field: &ScalarField) -> Result<Vec<u8>, ExportError> {
    let image = GrayImage::from_fn(field.width(), field.height(), |x, y| {
        Luma([(field.get(x, y) * 255.0).clamp(0.0, 255.0).round() as u8])
    });
    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, ImageFormat::Png)?;
    Ok(encoded.into_inner())
}
