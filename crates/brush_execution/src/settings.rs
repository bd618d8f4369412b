use driver::DynamicsConfig;
use model::{BlendMode, Rgba8};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushShape {
    #[default]
    Circle,
    Square,
    Diamond,
    Triangle,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureKind {
    Noise,
    Bristle,
    Canvas,
    Paper,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrushTexture {
    pub kind: TextureKind,
    /// Feature size in pixels.
    #[serde(default = "default_texture_scale")]
    pub scale: f32,
    /// 0 leaves the stamp untouched, 1 lets the pattern fully cut into it.
    #[serde(default = "default_texture_strength")]
    pub strength: f32,
}

fn default_texture_scale() -> f32 {
    4.0
}

fn default_texture_strength() -> f32 {
    0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintMode {
    #[default]
    Paint,
    /// Removes alpha from the target instead of depositing color.
    Erase,
}

/// Captured at stroke start and fixed for the stroke's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    /// Stamp diameter in pixels.
    pub size: f32,
    pub opacity: f32,
    pub flow: f32,
    pub hardness: f32,
    /// Stamp spacing as a fraction of `size`.
    pub spacing: f32,
    pub shape: BrushShape,
    pub texture: Option<BrushTexture>,
    pub angle_degrees: f32,
    /// Maximum random rotation added per stamp, in degrees.
    pub angle_jitter_degrees: f32,
    pub color: Rgba8,
    pub blend_mode: BlendMode,
    pub mode: PaintMode,
    pub dynamics: DynamicsConfig,
    pub seed: u64,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 12.0,
            opacity: 1.0,
            flow: 1.0,
            hardness: 0.8,
            spacing: 0.25,
            shape: BrushShape::Circle,
            texture: None,
            angle_degrees: 0.0,
            angle_jitter_degrees: 0.0,
            color: Rgba8::BLACK,
            blend_mode: BlendMode::Normal,
            mode: PaintMode::Paint,
            dynamics: DynamicsConfig::default(),
            seed: 0,
        }
    }
}

impl BrushSettings {
    pub const MIN_SPACING_PIXELS: f32 = 0.5;

    pub fn spacing_pixels(&self) -> f32 {
        (self.spacing.max(0.0) * self.size.max(0.0)).max(Self::MIN_SPACING_PIXELS)
    }

    /// Copy with every numeric field pulled into its valid range.
    pub fn sanitized(&self) -> Self {
        Self {
            size: finite_or(self.size, 1.0).max(0.0),
            opacity: finite_or(self.opacity, 1.0).clamp(0.0, 1.0),
            flow: finite_or(self.flow, 1.0).clamp(0.0, 1.0),
            hardness: finite_or(self.hardness, 1.0).clamp(0.0, 1.0),
            spacing: finite_or(self.spacing, 0.25).max(0.0),
            angle_jitter_degrees: finite_or(self.angle_jitter_degrees, 0.0).abs(),
            texture: self.texture.map(|texture| BrushTexture {
                scale: finite_or(texture.scale, 4.0).max(0.5),
                strength: finite_or(texture.strength, 0.0).clamp(0.0, 1.0),
                ..texture
            }),
            ..self.clone()
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}
