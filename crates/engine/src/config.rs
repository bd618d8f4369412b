use brush_execution::{BrushSettings, StitchType, ThreadParams};
use driver::StabilizerConfig;
use effects::PuffStyle;
use relief::ReliefConfig;
use serde::{Deserialize, Serialize};

/// When the engine recomposes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomposePolicy {
    /// Only when the caller asks for the composite.
    #[default]
    OnDemand,
    /// After every commit, pushing to the attached surface if there is one.
    EveryCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuffConfig {
    pub style: PuffStyle,
    pub default_height: f32,
    pub default_curvature: f32,
}

impl Default for PuffConfig {
    fn default() -> Self {
        Self {
            style: PuffStyle::default(),
            default_height: 1.0,
            default_curvature: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbroideryConfig {
    pub stitch_type: StitchType,
    pub thread: ThreadParams,
    /// Relief height given to embroidery layers that have none yet.
    pub height: f32,
}

impl Default for EmbroideryConfig {
    fn default() -> Self {
        Self {
            stitch_type: StitchType::default(),
            thread: ThreadParams::default(),
            height: 0.6,
        }
    }
}

/// Everything the engine can be configured with. Every field has a default,
/// so a partial JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Free-list length the buffer pool trims to; `None` keeps everything.
    pub pool_watermark: Option<usize>,
    pub brush: BrushSettings,
    pub stabilizer: StabilizerConfig,
    pub puff: PuffConfig,
    pub embroidery: EmbroideryConfig,
    pub relief: ReliefConfig,
    pub recompose: RecomposePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1024,
            canvas_height: 1024,
            pool_watermark: Some(8),
            brush: BrushSettings::default(),
            stabilizer: StabilizerConfig::default(),
            puff: PuffConfig::default(),
            embroidery: EmbroideryConfig::default(),
            relief: ReliefConfig::default(),
            recompose: RecomposePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_canvas(width: u32, height: u32) -> Self {
        Self {
            canvas_width: width,
            canvas_height: height,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
