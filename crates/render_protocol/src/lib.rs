//! Types exchanged between the layer store, the compositor and the 3D
//! surface collaborator.

use effects::LayerEffect;
use model::{BlendMode, RasterBuffer, ScalarField};
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    pub struct LayerId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Raster,
    Vector,
    Text,
    Group,
    Mask,
    Puff,
    Embroidery,
}

impl LayerKind {
    /// Whether pixel tools may paint into layers of this kind.
    pub fn is_paintable(self) -> bool {
        matches!(
            self,
            LayerKind::Raster | LayerKind::Mask | LayerKind::Puff | LayerKind::Embroidery
        )
    }
}

/// Tool that created a layer and keeps drawing into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTag {
    Brush,
    Puff,
    Embroidery,
    Fill,
    Erase,
}

impl ToolTag {
    /// Layer kind a tool creates when no tagged layer exists yet.
    pub fn layer_kind(self) -> LayerKind {
        match self {
            ToolTag::Puff => LayerKind::Puff,
            ToolTag::Embroidery => LayerKind::Embroidery,
            ToolTag::Brush | ToolTag::Fill | ToolTag::Erase => LayerKind::Raster,
        }
    }

    pub fn default_layer_name(self) -> &'static str {
        match self {
            ToolTag::Brush => "Brush",
            ToolTag::Puff => "Puff Paint",
            ToolTag::Embroidery => "Embroidery",
            ToolTag::Fill => "Fill",
            ToolTag::Erase => "Erase",
        }
    }
}

/// Borrowed view of one visible node, back-to-front.
#[derive(Debug, Clone)]
pub enum RenderNode<'a> {
    Leaf {
        layer_id: LayerId,
        buffer: &'a RasterBuffer,
        mask: Option<&'a RasterBuffer>,
        blend: BlendMode,
        opacity: f32,
        effects: &'a [LayerEffect],
    },
    Group {
        /// `None` for the synthetic root.
        group_id: Option<LayerId>,
        blend: BlendMode,
        opacity: f32,
        children: Vec<RenderNode<'a>>,
    },
}

impl RenderNode<'_> {
    fn visit_leaves(&self, visit: &mut impl FnMut(&Self)) {
        match self {
            RenderNode::Leaf { .. } => visit(self),
            RenderNode::Group { children, .. } => {
                for child in children {
                    child.visit_leaves(visit);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderTree<'a> {
    pub revision: u64,
    pub width: u32,
    pub height: u32,
    pub root: RenderNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RenderTreeError {
    #[error("layer {layer_id:?} is {actual:?}, canvas is {expected:?}")]
    DimensionMismatch {
        layer_id: LayerId,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl RenderTree<'_> {
    pub fn has_effects(&self) -> bool {
        let mut found = false;
        self.root.visit_leaves(&mut |leaf| {
            if let RenderNode::Leaf { effects, .. } = leaf {
                found |= !effects.is_empty();
            }
        });
        found
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.root.visit_leaves(&mut |_| count += 1);
        count
    }

    /// Every leaf buffer and mask must match the canvas size.
    pub fn validate(&self) -> Result<(), RenderTreeError> {
        let expected = (self.width, self.height);
        let mut error = None;
        self.root.visit_leaves(&mut |leaf| {
            let RenderNode::Leaf {
                layer_id,
                buffer,
                mask,
                ..
            } = leaf
            else {
                return;
            };
            if error.is_some() {
                return;
            }
            let sizes =
                std::iter::once(buffer.dimensions()).chain(mask.map(|mask| mask.dimensions()));
            for actual in sizes {
                if actual != expected {
                    error = Some(RenderTreeError::DimensionMismatch {
                        layer_id: *layer_id,
                        expected,
                        actual,
                    });
                    return;
                }
            }
        });
        error.map_or(Ok(()), Err)
    }
}

/// A layer feeding the displacement field.
#[derive(Debug, Clone, Copy)]
pub struct HeightSource<'a> {
    pub layer_id: LayerId,
    /// Painted alpha is the height mask.
    pub buffer: &'a RasterBuffer,
    pub height: f32,
    pub curvature: f32,
}

/// Composited texture handed to the 3D surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTexture<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
    pub revision: u64,
}

/// Upper bound for [`ReliefParameters::displacement_scale`].
pub const MAX_DISPLACEMENT_SCALE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliefParameters {
    pub displacement_scale: f32,
    pub normal_scale: [f32; 2],
    pub roughness: f32,
}

impl Default for ReliefParameters {
    fn default() -> Self {
        Self {
            displacement_scale: 0.0,
            normal_scale: [0.0, 0.0],
            roughness: 0.8,
        }
    }
}

/// The 3D surface collaborator. Implementations must copy what they keep;
/// borrowed data is only valid for the duration of the call.
pub trait SurfaceSink {
    fn apply_texture(&mut self, texture: SurfaceTexture<'_>);

    fn apply_relief(
        &mut self,
        displacement: &ScalarField,
        normal_map: &RasterBuffer,
        parameters: ReliefParameters,
    );
}
