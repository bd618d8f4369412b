use std::time::SystemTime;

use bitflags::bitflags;
use effects::LayerEffect;
use model::{BlendMode, RasterBuffer};
use render_protocol::{LayerId, LayerKind, ToolTag};

use crate::vector::VectorShape;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerFlags: u8 {
        const VISIBLE = 1 << 0;
        const LOCKED = 1 << 1;
    }
}

/// Editable source a layer's pixels were rendered from.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    Vector(VectorShape),
    /// Text with a caller-rendered buffer; glyph layout happens elsewhere.
    Text(String),
}

#[derive(Debug)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) name: String,
    pub(crate) kind: LayerKind,
    pub(crate) flags: LayerFlags,
    pub(crate) opacity: f32,
    pub(crate) blend: BlendMode,
    /// `None` only for groups.
    pub(crate) buffer: Option<RasterBuffer>,
    pub(crate) mask: Option<RasterBuffer>,
    pub(crate) tool: Option<ToolTag>,
    pub(crate) height: Option<f32>,
    pub(crate) curvature: Option<f32>,
    pub(crate) effects: Vec<LayerEffect>,
    pub(crate) source: Option<LayerSource>,
    pub(crate) parent: Option<LayerId>,
    /// Back-to-front members; groups only.
    pub(crate) children: Vec<LayerId>,
    pub(crate) created: SystemTime,
    pub(crate) modified: SystemTime,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        name: String,
        kind: LayerKind,
        buffer: Option<RasterBuffer>,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            name,
            kind,
            flags: LayerFlags::VISIBLE,
            opacity: 1.0,
            blend: BlendMode::Normal,
            buffer,
            mask: None,
            tool: None,
            height: None,
            curvature: None,
            effects: Vec::new(),
            source: None,
            parent: None,
            children: Vec::new(),
            created: now,
            modified: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.modified = SystemTime::now();
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        self.kind == LayerKind::Group
    }

    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(LayerFlags::VISIBLE)
    }

    pub fn is_locked(&self) -> bool {
        self.flags.contains(LayerFlags::LOCKED)
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    pub fn buffer(&self) -> Option<&RasterBuffer> {
        self.buffer.as_ref()
    }

    pub fn mask(&self) -> Option<&RasterBuffer> {
        self.mask.as_ref()
    }

    pub fn tool(&self) -> Option<ToolTag> {
        self.tool
    }

    pub fn height(&self) -> Option<f32> {
        self.height
    }

    pub fn curvature(&self) -> Option<f32> {
        self.curvature
    }

    pub fn effects(&self) -> &[LayerEffect] {
        &self.effects
    }

    pub fn source(&self) -> Option<&LayerSource> {
        self.source.as_ref()
    }

    pub fn vector_shape(&self) -> Option<&VectorShape> {
        match &self.source {
            Some(LayerSource::Vector(shape)) => Some(shape),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub fn children(&self) -> &[LayerId] {
        &self.children
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Whether this layer feeds the displacement field.
    pub fn contributes_height(&self) -> bool {
        !self.is_group() && self.height.is_some_and(|height| height > 0.0)
    }
}
