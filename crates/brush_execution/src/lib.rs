//! CPU brush engine: stamp placement along strokes, stamp shapes and
//! textures, and embroidery thread rendering.

mod rasterizer;
mod settings;
mod stamp;
pub mod stitch;

use model::RasterError;
use raster_pool::PoolError;

pub use rasterizer::{BrushRasterizer, StrokeId, StrokeProgress, StrokeSummary};
pub use settings::{BrushSettings, BrushShape, BrushTexture, PaintMode, TextureKind};
pub use stamp::{Stamp, render_stamp, shape_coverage, shape_distance, texture_value};
pub use stitch::{
    MAX_NEEDLE_POINTS, StitchType, ThreadParams, plan_stitches, render_stitches, resample_polyline,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrushError {
    #[error("no stroke is active")]
    NoActiveStroke,
    #[error("a stroke is already active; end it before starting another")]
    StrokeAlreadyActive,
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[cfg(test)]
mod tests;
