//! Derived-pixel rasterizers. Every effect is a pure transform from a source
//! buffer and parameters to a freshly allocated buffer; puff dabs are the one
//! exception and stamp straight onto their target.

mod bevel;
mod blur;
mod gradient;
mod puff;
mod shadow;

use model::RasterError;
use serde::{Deserialize, Serialize};

pub use bevel::{BevelOutput, BevelParams, bevel, emboss};
pub use blur::{alpha_plane, box_blur_plane};
pub use gradient::{GradientKind, GradientSpec, GradientStop, gradient, render_gradient};
pub use puff::{PUFF_FALLOFF_STOPS, PuffDab, PuffStyle, puff_falloff, stamp_puff_dab};
pub use shadow::{GlowParams, ShadowParams, drop_shadow, outer_glow};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("gradient needs at least one color stop")]
    EmptyGradient,
}

/// Effect attached to a layer and rendered by the compositor around the
/// layer's own pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerEffect {
    DropShadow(ShadowParams),
    OuterGlow(GlowParams),
    Bevel(BevelParams),
    Emboss(BevelParams),
}

impl LayerEffect {
    /// Effects drawn underneath the layer pixels.
    pub fn is_underlay(&self) -> bool {
        matches!(self, LayerEffect::DropShadow(_) | LayerEffect::OuterGlow(_))
    }
}
