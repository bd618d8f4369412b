//! Layer model and store.
//!
//! [`Document`] owns every layer, the back-to-front layer order, group
//! membership, the active layer and selection, and the buffer pool that
//! backs layer pixels. Structural operations validate all inputs before
//! mutating anything, so a failed call leaves the document untouched.
//!
//! Every mutation bumps [`Document::revision`]. Pixel-visible changes also
//! mark rows in the document's [`DirtyRows`] so the compositor can re-blend
//! only what changed; changes that can affect relief additionally bump
//! [`Document::height_revision`].

mod flatten;
mod layer;
mod order;
mod vector;

use std::ops::Range;

use effects::LayerEffect;
use log::{debug, warn};
use model::{BlendMode, DirtyRows, RasterBuffer, RasterError};
use raster_pool::{PoolError, PoolStats, RasterPool};
use render_protocol::{HeightSource, LayerId, LayerKind, RenderNode, RenderTree, ToolTag};
use renderer::RenderError;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

pub use layer::{Layer, LayerFlags, LayerSource};
pub use vector::{ShapeStroke, VectorShape, render_vector_shape};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DocumentError {
    #[error("layer {layer_id:?} not found")]
    LayerNotFound { layer_id: LayerId },
    #[error("cannot place {layer_id:?} inside {group_id:?}: it would contain itself")]
    GroupCycle { layer_id: LayerId, group_id: LayerId },
    #[error("layer {layer_id:?} is not a group")]
    NotAGroup { layer_id: LayerId },
    #[error("grouped layers must share one parent")]
    NotSameLevel,
    #[error("layer {layer_id:?} is locked")]
    LayerLocked { layer_id: LayerId },
    #[error("layer {layer_id:?} of kind {kind:?} has no paintable pixels")]
    NotPaintable { layer_id: LayerId, kind: LayerKind },
    #[error("layer {layer_id:?} is {actual:?}, expected {expected:?}")]
    KindMismatch {
        layer_id: LayerId,
        expected: LayerKind,
        actual: LayerKind,
    },
    #[error("layer {layer_id:?} has no mask")]
    NoMask { layer_id: LayerId },
    #[error("merge needs at least one layer with pixels")]
    NothingToMerge,
    #[error("invalid canvas dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// What happens to the members of a deleted group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDeletePolicy {
    DeleteMembers,
    /// Members take the group's place in its parent, keeping their order.
    PromoteMembers,
}

/// A layer's pixels together with the pool, borrowed at once so stroke
/// snapshots can be leased while the layer is being painted.
#[derive(Debug)]
pub struct PaintTarget<'a> {
    pub buffer: &'a mut RasterBuffer,
    pub pool: &'a mut RasterPool,
}

#[derive(Debug)]
pub struct Document {
    width: u32,
    height: u32,
    pool: RasterPool,
    layers: SlotMap<LayerId, Layer>,
    /// Back-to-front top-level order.
    root: Vec<LayerId>,
    active: Option<LayerId>,
    selection: Vec<LayerId>,
    revision: u64,
    height_revision: u64,
    dirty: DirtyRows,
}

impl Document {
    pub fn new(width: u32, height: u32) -> Result<Self, DocumentError> {
        Self::with_pool(width, height, RasterPool::new())
    }

    pub fn with_pool(width: u32, height: u32, pool: RasterPool) -> Result<Self, DocumentError> {
        if width == 0 || height == 0 {
            return Err(DocumentError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pool,
            layers: SlotMap::with_key(),
            root: Vec::new(),
            active: None,
            selection: Vec::new(),
            revision: 0,
            height_revision: 0,
            dirty: DirtyRows::full(height),
        })
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

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Bumped whenever a change may alter the displacement field.
    pub fn height_revision(&self) -> u64 {
        self.height_revision
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn set_pool_watermark(&mut self, max_free_entries: Option<usize>) {
        self.pool.set_max_free_entries(max_free_entries);
    }

    pub fn layer(&self, layer_id: LayerId) -> Result<&Layer, DocumentError> {
        self.layers
            .get(layer_id)
            .ok_or(DocumentError::LayerNotFound { layer_id })
    }

    pub fn contains(&self, layer_id: LayerId) -> bool {
        self.layers.contains_key(layer_id)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Top-level ids, back-to-front.
    pub fn root_order(&self) -> &[LayerId] {
        &self.root
    }

    /// Every non-group layer, back-to-front, descending into groups.
    pub fn render_order(&self) -> Vec<LayerId> {
        let mut order = Vec::with_capacity(self.layers.len());
        self.collect_leaves(&self.root, &mut order);
        order
    }

    fn collect_leaves(&self, ids: &[LayerId], order: &mut Vec<LayerId>) {
        for &id in ids {
            let layer = &self.layers[id];
            if layer.is_group() {
                self.collect_leaves(&layer.children, order);
            } else {
                order.push(id);
            }
        }
    }

    pub fn active_layer(&self) -> Option<LayerId> {
        self.active
    }

    pub fn selection(&self) -> &[LayerId] {
        &self.selection
    }

    /// Topmost layer created for `tool`.
    pub fn find_tool_layer(&self, tool: ToolTag) -> Option<LayerId> {
        self.render_order()
            .into_iter()
            .rev()
            .find(|id| self.layers[*id].tool == Some(tool))
    }

    pub fn create_layer(
        &mut self,
        name: impl Into<String>,
        kind: LayerKind,
    ) -> Result<LayerId, DocumentError> {
        if kind == LayerKind::Group {
            return self.create_group(name, &[]);
        }
        let buffer = self.pool.acquire(self.width, self.height)?;
        let id = self
            .layers
            .insert_with_key(|id| Layer::new(id, name.into(), kind, Some(buffer)));
        self.insert_above_active(id);
        self.active = Some(id);
        self.structure_changed();
        debug!("created {:?} layer {:?}", kind, id);
        Ok(id)
    }

    /// New layer owned by `tool`, of the kind that tool paints into.
    pub fn create_tool_layer(&mut self, tool: ToolTag) -> Result<LayerId, DocumentError> {
        let id = self.create_layer(tool.default_layer_name(), tool.layer_kind())?;
        self.layers[id].tool = Some(tool);
        Ok(id)
    }

    pub fn create_vector_layer(
        &mut self,
        name: impl Into<String>,
        shape: VectorShape,
    ) -> Result<LayerId, DocumentError> {
        let mut buffer = self.pool.acquire(self.width, self.height)?;
        render_vector_shape(&mut buffer, &shape);
        let id = self
            .layers
            .insert_with_key(|id| Layer::new(id, name.into(), LayerKind::Vector, Some(buffer)));
        self.layers[id].source = Some(LayerSource::Vector(shape));
        self.insert_above_active(id);
        self.active = Some(id);
        self.structure_changed();
        Ok(id)
    }

    /// Text layer whose pixels were rendered by the caller.
    pub fn create_text_layer(
        &mut self,
        name: impl Into<String>,
        text: impl Into<String>,
        rendered: &RasterBuffer,
    ) -> Result<LayerId, DocumentError> {
        self.check_canvas_size(rendered)?;
        let buffer = self.pool.acquire_copy(rendered)?;
        let id = self
            .layers
            .insert_with_key(|id| Layer::new(id, name.into(), LayerKind::Text, Some(buffer)));
        self.layers[id].source = Some(LayerSource::Text(text.into()));
        self.insert_above_active(id);
        self.active = Some(id);
        self.structure_changed();
        Ok(id)
    }

    pub fn set_vector_shape(
        &mut self,
        layer_id: LayerId,
        shape: VectorShape,
    ) -> Result<(), DocumentError> {
        self.expect_kind(layer_id, LayerKind::Vector)?;
        self.ensure_unlocked(layer_id)?;
        let layer = &mut self.layers[layer_id];
        if let Some(buffer) = layer.buffer.as_mut() {
            render_vector_shape(buffer, &shape);
        }
        layer.source = Some(LayerSource::Vector(shape));
        self.mark_painted(layer_id, 0..self.height)
    }

    pub fn set_text(
        &mut self,
        layer_id: LayerId,
        text: impl Into<String>,
        rendered: &RasterBuffer,
    ) -> Result<(), DocumentError> {
        self.expect_kind(layer_id, LayerKind::Text)?;
        self.ensure_unlocked(layer_id)?;
        self.check_canvas_size(rendered)?;
        let layer = &mut self.layers[layer_id];
        if let Some(buffer) = layer.buffer.as_mut() {
            buffer.copy_from(rendered)?;
        }
        layer.source = Some(LayerSource::Text(text.into()));
        self.mark_painted(layer_id, 0..self.height)
    }

    /// Removes a layer. Groups are removed with their members. If the active
    /// layer goes away, the layer that took its place becomes active.
    pub fn delete_layer(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        if self.layer(layer_id)?.is_group() {
            return self.delete_group(layer_id, GroupDeletePolicy::DeleteMembers);
        }
        let (parent, index) = self.position(layer_id);
        self.siblings_mut(parent).remove(index);
        self.remove_subtree(layer_id);
        self.repair_active(parent, index);
        self.structure_changed();
        debug!("deleted layer {:?}", layer_id);
        Ok(())
    }

    /// Copies a layer, or a group with all its members, directly above the
    /// original. The copy becomes active.
    pub fn duplicate_layer(&mut self, layer_id: LayerId) -> Result<LayerId, DocumentError> {
        self.layer(layer_id)?;
        let (parent, index) = self.position(layer_id);
        let mut created = Vec::new();
        let copy = match self.copy_subtree(layer_id, parent, &mut created) {
            Ok(copy) => copy,
            Err(error) => {
                for id in created {
                    self.release_layer(id);
                }
                return Err(error);
            }
        };
        let name = format!("{} copy", self.layers[layer_id].name);
        self.layers[copy].name = name;
        self.siblings_mut(parent).insert(index + 1, copy);
        self.active = Some(copy);
        self.structure_changed();
        Ok(copy)
    }

    fn copy_subtree(
        &mut self,
        layer_id: LayerId,
        parent: Option<LayerId>,
        created: &mut Vec<LayerId>,
    ) -> Result<LayerId, DocumentError> {
        let source = &self.layers[layer_id];
        let buffer = match source.buffer.as_ref() {
            Some(buffer) => Some(self.pool.acquire_copy(buffer)?),
            None => None,
        };
        let mask = match source.mask.as_ref().map(|mask| self.pool.acquire_copy(mask)) {
            Some(Ok(mask)) => Some(mask),
            Some(Err(error)) => {
                if let Some(buffer) = buffer {
                    self.pool.release(buffer);
                }
                return Err(error.into());
            }
            None => None,
        };
        let source = &self.layers[layer_id];
        let (name, kind, children) = (source.name.clone(), source.kind, source.children.clone());
        let (flags, opacity) = (source.flags, source.opacity);
        let (blend, tool) = (source.blend, source.tool);
        let (height, curvature) = (source.height, source.curvature);
        let (effects, layer_source) = (source.effects.clone(), source.source.clone());

        let copy = self.layers.insert_with_key(|id| {
            let mut layer = Layer::new(id, name, kind, buffer);
            layer.flags = flags;
            layer.opacity = opacity;
            layer.blend = blend;
            layer.mask = mask;
            layer.tool = tool;
            layer.height = height;
            layer.curvature = curvature;
            layer.effects = effects;
            layer.source = layer_source;
            layer.parent = parent;
            layer
        });
        created.push(copy);
        for child in children {
            let child_copy = self.copy_subtree(child, Some(copy), created)?;
            self.layers[copy].children.push(child_copy);
        }
        Ok(copy)
    }

    pub fn rename(
        &mut self,
        layer_id: LayerId,
        name: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        layer.name = name.into();
        layer.touch();
        self.revision += 1;
        Ok(())
    }

    pub fn set_visible(&mut self, layer_id: LayerId, visible: bool) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        if layer.is_visible() == visible {
            return Ok(());
        }
        layer.flags.set(LayerFlags::VISIBLE, visible);
        layer.touch();
        self.structure_changed();
        Ok(())
    }

    pub fn set_locked(&mut self, layer_id: LayerId, locked: bool) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        layer.flags.set(LayerFlags::LOCKED, locked);
        layer.touch();
        self.revision += 1;
        Ok(())
    }

    /// Out-of-range opacity is clamped to `[0, 1]`; non-finite values are
    /// ignored.
    pub fn set_opacity(&mut self, layer_id: LayerId, opacity: f32) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        if !opacity.is_finite() {
            warn!("ignoring non-finite opacity for layer {:?}", layer_id);
            return Ok(());
        }
        let clamped = opacity.clamp(0.0, 1.0);
        if clamped != opacity {
            warn!("opacity {} clamped to {} for layer {:?}", opacity, clamped, layer_id);
        }
        layer.opacity = clamped;
        layer.touch();
        self.structure_changed();
        Ok(())
    }

    pub fn set_blend_mode(
        &mut self,
        layer_id: LayerId,
        blend: BlendMode,
    ) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        layer.blend = blend;
        layer.touch();
        self.structure_changed();
        Ok(())
    }

    /// Relief height; `None` or zero removes the layer from the
    /// displacement field.
    pub fn set_height(
        &mut self,
        layer_id: LayerId,
        height: Option<f32>,
    ) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        layer.height = height.filter(|value| value.is_finite()).map(|value| value.max(0.0));
        layer.touch();
        self.revision += 1;
        self.height_revision += 1;
        Ok(())
    }

    pub fn set_curvature(
        &mut self,
        layer_id: LayerId,
        curvature: Option<f32>,
    ) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        layer.curvature = curvature
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 1.0));
        layer.touch();
        self.revision += 1;
        self.height_revision += 1;
        Ok(())
    }

    pub fn set_effects(
        &mut self,
        layer_id: LayerId,
        effects: Vec<LayerEffect>,
    ) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        if layer.is_group() {
            return Err(DocumentError::NotPaintable {
                layer_id,
                kind: LayerKind::Group,
            });
        }
        layer.effects = effects;
        layer.touch();
        self.structure_changed();
        Ok(())
    }

    pub fn select(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        self.layer(layer_id)?;
        self.selection = vec![layer_id];
        self.active = Some(layer_id);
        Ok(())
    }

    /// Replaces the selection; the last id becomes active.
    pub fn select_multiple(&mut self, layer_ids: &[LayerId]) -> Result<(), DocumentError> {
        for &layer_id in layer_ids {
            self.layer(layer_id)?;
        }
        let mut selection: Vec<LayerId> = Vec::with_capacity(layer_ids.len());
        for &layer_id in layer_ids {
            if !selection.contains(&layer_id) {
                selection.push(layer_id);
            }
        }
        if let Some(&last) = selection.last() {
            self.active = Some(last);
        }
        self.selection = selection;
        Ok(())
    }

    /// Empties the selection; the active layer stays.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Mutable pixels of a paintable, unlocked layer.
    pub fn paint_target(&mut self, layer_id: LayerId) -> Result<PaintTarget<'_>, DocumentError> {
        self.ensure_paintable(layer_id)?;
        let layer = &mut self.layers[layer_id];
        let kind = layer.kind;
        let buffer = layer
            .buffer
            .as_mut()
            .ok_or(DocumentError::NotPaintable { layer_id, kind })?;
        Ok(PaintTarget {
            buffer,
            pool: &mut self.pool,
        })
    }

    /// Mutable mask pixels of an unlocked layer.
    pub fn mask_target(&mut self, layer_id: LayerId) -> Result<&mut RasterBuffer, DocumentError> {
        self.ensure_unlocked(layer_id)?;
        self.layers[layer_id]
            .mask
            .as_mut()
            .ok_or(DocumentError::NoMask { layer_id })
    }

    /// Records that `rows` of a layer's pixels changed.
    pub fn mark_painted(
        &mut self,
        layer_id: LayerId,
        rows: Range<u32>,
    ) -> Result<(), DocumentError> {
        let layer = self.layer_mut(layer_id)?;
        layer.touch();
        let affects_height = layer.contributes_height();
        self.dirty.mark_span(rows.start as i64, rows.end as i64);
        self.revision += 1;
        if affects_height {
            self.height_revision += 1;
        }
        Ok(())
    }

    pub fn dirty_rows(&self) -> &DirtyRows {
        &self.dirty
    }

    /// Hands the accumulated dirty rows to the caller and starts a clean set.
    pub fn take_dirty_rows(&mut self) -> DirtyRows {
        self.dirty.take()
    }

    /// Visible nodes, back-to-front, borrowed for one composition.
    pub fn render_tree(&self) -> RenderTree<'_> {
        RenderTree {
            revision: self.revision,
            width: self.width,
            height: self.height,
            root: RenderNode::Group {
                group_id: None,
                blend: BlendMode::Normal,
                opacity: 1.0,
                children: self.render_nodes(&self.root),
            },
        }
    }

    fn render_nodes(&self, ids: &[LayerId]) -> Vec<RenderNode<'_>> {
        ids.iter()
            .map(|id| &self.layers[*id])
            .filter(|layer| layer.is_visible())
            .filter_map(|layer| self.render_node(layer))
            .collect()
    }

    fn render_node<'a>(&'a self, layer: &'a Layer) -> Option<RenderNode<'a>> {
        if layer.is_group() {
            return Some(RenderNode::Group {
                group_id: Some(layer.id),
                blend: layer.blend,
                opacity: layer.opacity,
                children: self.render_nodes(&layer.children),
            });
        }
        layer.buffer.as_ref().map(|buffer| RenderNode::Leaf {
            layer_id: layer.id,
            buffer,
            mask: layer.mask.as_ref(),
            blend: layer.blend,
            opacity: layer.opacity,
            effects: &layer.effects,
        })
    }

    /// Visible height-contributing layers, back-to-front.
    pub fn height_sources(&self) -> Vec<HeightSource<'_>> {
        let mut sources = Vec::new();
        self.collect_height_sources(&self.root, &mut sources);
        sources
    }

    fn collect_height_sources<'a>(&'a self, ids: &[LayerId], sources: &mut Vec<HeightSource<'a>>) {
        for &id in ids {
            let layer = &self.layers[id];
            if !layer.is_visible() {
                continue;
            }
            if layer.is_group() {
                self.collect_height_sources(&layer.children, sources);
                continue;
            }
            if !layer.contributes_height() {
                continue;
            }
            if let (Some(buffer), Some(height)) = (layer.buffer.as_ref(), layer.height) {
                sources.push(HeightSource {
                    layer_id: id,
                    buffer,
                    height,
                    curvature: layer.curvature.unwrap_or(0.0),
                });
            }
        }
    }

    fn layer_mut(&mut self, layer_id: LayerId) -> Result<&mut Layer, DocumentError> {
        self.layers
            .get_mut(layer_id)
            .ok_or(DocumentError::LayerNotFound { layer_id })
    }

    fn ensure_unlocked(&self, layer_id: LayerId) -> Result<(), DocumentError> {
        if self.layer(layer_id)?.is_locked() {
            warn!("layer {:?} is locked", layer_id);
            return Err(DocumentError::LayerLocked { layer_id });
        }
        Ok(())
    }

    fn ensure_paintable(&self, layer_id: LayerId) -> Result<(), DocumentError> {
        let kind = self.layer(layer_id)?.kind;
        if !kind.is_paintable() {
            return Err(DocumentError::NotPaintable { layer_id, kind });
        }
        self.ensure_unlocked(layer_id)
    }

    fn expect_kind(&self, layer_id: LayerId, expected: LayerKind) -> Result<(), DocumentError> {
        let actual = self.layer(layer_id)?.kind;
        if actual != expected {
            return Err(DocumentError::KindMismatch {
                layer_id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn check_canvas_size(&self, buffer: &RasterBuffer) -> Result<(), DocumentError> {
        if buffer.dimensions() != self.dimensions() {
            return Err(RasterError::DimensionMismatch {
                expected: self.dimensions(),
                actual: buffer.dimensions(),
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn structure_changed(&mut self) {
        self.revision += 1;
        self.height_revision += 1;
        self.dirty.mark_all();
    }

    pub(crate) fn siblings(&self, parent: Option<LayerId>) -> &Vec<LayerId> {
        match parent {
            Some(group) => &self.layers[group].children,
            None => &self.root,
        }
    }

    pub(crate) fn siblings_mut(&mut self, parent: Option<LayerId>) -> &mut Vec<LayerId> {
        match parent {
            Some(group) => &mut self.layers[group].children,
            None => &mut self.root,
        }
    }

    /// Parent and index among siblings of a live layer.
    pub(crate) fn position(&self, layer_id: LayerId) -> (Option<LayerId>, usize) {
        let parent = self.layers[layer_id].parent;
        let index = self
            .siblings(parent)
            .iter()
            .position(|id| *id == layer_id)
            .unwrap_or_else(|| panic!("layer {layer_id:?} missing from its parent's order"));
        (parent, index)
    }

    /// Places a detached layer directly above the active layer, or on top
    /// of the root when nothing is active.
    pub(crate) fn insert_above_active(&mut self, layer_id: LayerId) {
        match self.active.filter(|active| self.layers.contains_key(*active)) {
            Some(active) => {
                let (parent, index) = self.position(active);
                self.layers[layer_id].parent = parent;
                self.siblings_mut(parent).insert(index + 1, layer_id);
            }
            None => {
                self.layers[layer_id].parent = None;
                self.root.push(layer_id);
            }
        }
    }

    /// Drops a detached layer and all its members, returning buffers to the
    /// pool.
    pub(crate) fn remove_subtree(&mut self, layer_id: LayerId) {
        let children = std::mem::take(&mut self.layers[layer_id].children);
        for child in children {
            self.remove_subtree(child);
        }
        self.release_layer(layer_id);
    }

    fn release_layer(&mut self, layer_id: LayerId) {
        if let Some(layer) = self.layers.remove(layer_id) {
            for buffer in layer.buffer.into_iter().chain(layer.mask) {
                self.pool.release(buffer);
            }
        }
        self.selection.retain(|id| *id != layer_id);
    }

    /// After removing the entry at `index` of `parent`'s children, moves the
    /// active layer to a live neighbour if it was removed.
    pub(crate) fn repair_active(&mut self, parent: Option<LayerId>, index: usize) {
        if self.active.is_some_and(|active| self.layers.contains_key(active)) {
            return;
        }
        let siblings = self.siblings(parent);
        let promoted = siblings
            .get(index)
            .or_else(|| index.checked_sub(1).and_then(|below| siblings.get(below)))
            .copied()
            .or(parent);
        self.active = promoted;
    }

    pub(crate) fn is_descendant(&self, candidate: LayerId, ancestor: LayerId) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.layers.get(id).and_then(|layer| layer.parent);
        }
        false
    }
}

#[cfg(test)]
mod tests;
