use brush_execution::{BrushSettings, PaintMode, StitchType, ThreadParams};
use driver::PointerSample;
use model::Rgba8;
use render_protocol::ToolTag;
use serde::{Deserialize, Serialize};

/// One tool request. The payload is shaped per tool; omitted optional
/// fields fall back to the engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolOperation {
    Brush {
        points: Vec<PointerSample>,
        #[serde(default)]
        settings: Option<BrushSettings>,
    },
    Puff {
        x: f32,
        y: f32,
        size: f32,
        opacity: f32,
        color: Rgba8,
        #[serde(default)]
        height: Option<f32>,
        #[serde(default)]
        curvature: Option<f32>,
    },
    Embroidery {
        #[serde(default)]
        stitch_type: Option<StitchType>,
        #[serde(default)]
        thread: Option<ThreadParams>,
        points: Vec<[f32; 2]>,
    },
    Fill {
        x: f32,
        y: f32,
        color: Rgba8,
        /// Largest per-channel difference from the seed colour still filled,
        /// as a fraction of the channel range.
        #[serde(default)]
        tolerance: f32,
    },
    Erase {
        x: f32,
        y: f32,
        size: f32,
    },
}

impl ToolOperation {
    /// Tool reported for this request. A brush stroke carrying erase
    /// settings reports as an erase.
    pub fn tool(&self) -> ToolTag {
        match self {
            ToolOperation::Brush {
                settings: Some(settings),
                ..
            } if settings.mode == PaintMode::Erase => ToolTag::Erase,
            ToolOperation::Brush { .. } => ToolTag::Brush,
            ToolOperation::Puff { .. } => ToolTag::Puff,
            ToolOperation::Embroidery { .. } => ToolTag::Embroidery,
            ToolOperation::Fill { .. } => ToolTag::Fill,
            ToolOperation::Erase { .. } => ToolTag::Erase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_parse_from_tagged_json() {
        let brush: ToolOperation = serde_json::from_str(
            r#"{"tool": "brush", "points": [
                {"x": 1.0, "y": 2.0},
                {"x": 5.0, "y": 2.0, "pressure": 0.5}
            ]}"#,
        )
        .expect("brush");
        let ToolOperation::Brush { points, settings } = &brush else {
            panic!("expected brush, got {brush:?}");
        };
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].pressure, None);
        assert_eq!(points[1].pressure, Some(0.5));
        assert!(settings.is_none());
        assert_eq!(brush.tool(), ToolTag::Brush);

        let fill: ToolOperation = serde_json::from_str(
            r#"{"tool": "fill", "x": 3, "y": 4, "color": {"r": 1, "g": 2, "b": 3, "a": 255}}"#,
        )
        .expect("fill");
        assert_eq!(
            fill,
            ToolOperation::Fill {
                x: 3.0,
                y: 4.0,
                color: Rgba8::opaque(1, 2, 3),
                tolerance: 0.0
            }
        );

        let stitches: ToolOperation = serde_json::from_str(
            r#"{"tool": "embroidery", "stitch_type": "satin", "points": [[0, 0], [10, 0]]}"#,
        )
        .expect("embroidery");
        assert_eq!(stitches.tool(), ToolTag::Embroidery);
    }

    #[test]
    fn erasing_brush_reports_as_erase() {
        let erase = ToolOperation::Brush {
            points: Vec::new(),
            settings: Some(BrushSettings {
                mode: PaintMode::Erase,
                ..BrushSettings::default()
            }),
        };
        assert_eq!(erase.tool(), ToolTag::Erase);
    }
}
