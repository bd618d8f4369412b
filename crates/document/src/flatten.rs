//! Whole-document and multi-layer pixel operations: merge, flatten,
//! rasterize, resize and masks.

use log::{debug, info};
use model::{BYTES_PER_PIXEL, BlendMode, RasterBuffer, Rgba8};
use render_protocol::{LayerId, LayerKind, RenderNode, RenderTree};
use renderer::{apply_mask, composite_tree_into};

use crate::layer::{Layer, LayerFlags};
use crate::vector::render_vector_shape;
use crate::{Document, DocumentError};

impl Document {
    /// Merges `layer_ids` into the lowest of them. Groups contribute all
    /// their members. Only visible content reaches the merged pixels; the
    /// result keeps the lowest layer's place, name and tool tag, and is
    /// reset to full opacity, normal blending and no effects.
    pub fn merge(&mut self, layer_ids: &[LayerId]) -> Result<LayerId, DocumentError> {
        for &layer_id in layer_ids {
            self.layer(layer_id)?;
        }
        let leaves: Vec<LayerId> = self
            .render_order()
            .into_iter()
            .filter(|leaf| layer_ids.iter().any(|id| self.is_descendant(*leaf, *id)))
            .collect();
        let Some(&target) = leaves.first() else {
            return Err(DocumentError::NothingToMerge);
        };
        for &leaf in &leaves {
            self.ensure_unlocked(leaf)?;
        }

        let mut merged = self.pool.acquire(self.width, self.height)?;
        let nodes: Vec<RenderNode<'_>> = leaves
            .iter()
            .filter(|id| self.is_effectively_visible(**id))
            .filter_map(|id| self.render_node(&self.layers[*id]))
            .collect();
        let tree = RenderTree {
            revision: self.revision,
            width: self.width,
            height: self.height,
            root: RenderNode::Group {
                group_id: None,
                blend: BlendMode::Normal,
                opacity: 1.0,
                children: nodes,
            },
        };
        if let Err(error) = composite_tree_into(&mut merged, &tree) {
            self.pool.release(merged);
            return Err(error.into());
        }

        let layer = &mut self.layers[target];
        let old_buffer = layer.buffer.replace(merged);
        let old_mask = layer.mask.take();
        if !layer.kind.is_paintable() {
            layer.kind = LayerKind::Raster;
        }
        layer.opacity = 1.0;
        layer.blend = BlendMode::Normal;
        layer.effects.clear();
        layer.source = None;
        layer.flags.insert(LayerFlags::VISIBLE);
        layer.touch();
        for buffer in old_buffer.into_iter().chain(old_mask) {
            self.pool.release(buffer);
        }

        for &leaf in &leaves[1..] {
            self.unlink_and_remove(leaf);
        }
        for &layer_id in layer_ids {
            let merged_group = self.layers.get(layer_id).is_some_and(Layer::is_group)
                && !self.is_descendant(target, layer_id);
            if merged_group {
                self.unlink_and_remove(layer_id);
            }
        }

        self.active = Some(target);
        self.selection = vec![target];
        self.structure_changed();
        info!("merged {} layers into {:?}", leaves.len(), target);
        Ok(target)
    }

    /// Replaces every layer with one raster layer holding the visible
    /// composite.
    pub fn flatten_all(&mut self) -> Result<LayerId, DocumentError> {
        let mut flattened = self.pool.acquire(self.width, self.height)?;
        if let Err(error) = composite_tree_into(&mut flattened, &self.render_tree()) {
            self.pool.release(flattened);
            return Err(error.into());
        }
        let previous = self.layers.len();
        for id in std::mem::take(&mut self.root) {
            self.remove_subtree(id);
        }
        let name = "Flattened".to_owned();
        let id = self
            .layers
            .insert_with_key(|id| Layer::new(id, name, LayerKind::Raster, Some(flattened)));
        self.root.push(id);
        self.active = Some(id);
        self.selection.clear();
        self.structure_changed();
        info!("flattened {} layers", previous);
        Ok(id)
    }

    /// Turns a vector or text layer into a plain raster layer, dropping its
    /// editable source. Raster-like layers are left alone.
    pub fn rasterize(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        let kind = self.layer(layer_id)?.kind;
        match kind {
            LayerKind::Group => Err(DocumentError::NotPaintable { layer_id, kind }),
            LayerKind::Vector | LayerKind::Text => {
                self.ensure_unlocked(layer_id)?;
                let layer = &mut self.layers[layer_id];
                layer.kind = LayerKind::Raster;
                layer.source = None;
                layer.touch();
                self.revision += 1;
                debug!("rasterized {:?}", layer_id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Resizes the canvas. Content stays anchored at the top-left and new
    /// area is transparent; masks reveal new area. Vector layers are drawn
    /// again at the new size. Nothing changes unless every new buffer could
    /// be allocated.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), DocumentError> {
        if width == 0 || height == 0 {
            return Err(DocumentError::InvalidDimensions { width, height });
        }
        if (width, height) == self.dimensions() {
            return Ok(());
        }

        let ids: Vec<LayerId> = self.layers.keys().collect();
        let mut replacements: Vec<(LayerId, Option<RasterBuffer>, Option<RasterBuffer>)> =
            Vec::with_capacity(ids.len());
        for id in ids {
            match self.resized_pixels(id, width, height) {
                Ok((buffer, mask)) => replacements.push((id, buffer, mask)),
                Err(error) => {
                    for (_, buffer, mask) in replacements {
                        for buffer in buffer.into_iter().chain(mask) {
                            self.pool.release(buffer);
                        }
                    }
                    return Err(error);
                }
            }
        }

        for (id, buffer, mask) in replacements {
            let layer = &mut self.layers[id];
            let mut released = Vec::with_capacity(2);
            if let Some(buffer) = buffer {
                released.extend(layer.buffer.replace(buffer));
            }
            if let Some(mask) = mask {
                released.extend(layer.mask.replace(mask));
            }
            let shape = layer.vector_shape().cloned();
            if let (Some(shape), Some(buffer)) = (shape, layer.buffer.as_mut()) {
                render_vector_shape(buffer, &shape);
            }
            for buffer in released {
                self.pool.release(buffer);
            }
        }

        let previous = self.dimensions();
        self.width = width;
        self.height = height;
        self.dirty.reset_full(height);
        self.structure_changed();
        info!("resized canvas {:?} -> {:?}", previous, (width, height));
        Ok(())
    }

    fn resized_pixels(
        &mut self,
        layer_id: LayerId,
        width: u32,
        height: u32,
    ) -> Result<(Option<RasterBuffer>, Option<RasterBuffer>), DocumentError> {
        let buffer = match self.layers[layer_id].buffer.as_ref() {
            Some(source) => {
                let mut resized = self.pool.acquire(width, height)?;
                copy_top_left(source, &mut resized);
                Some(resized)
            }
            None => None,
        };
        let mask = match self.layers[layer_id].mask.as_ref() {
            Some(source) => match self.pool.acquire(width, height) {
                Ok(mut resized) => {
                    resized.fill(Rgba8::WHITE);
                    copy_top_left(source, &mut resized);
                    Some(resized)
                }
                Err(error) => {
                    if let Some(buffer) = buffer {
                        self.pool.release(buffer);
                    }
                    return Err(error.into());
                }
            },
            None => None,
        };
        Ok((buffer, mask))
    }

    /// Gives a layer a fully revealing mask. Layers that already have one
    /// keep it.
    pub fn add_mask(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        let layer = self.layer(layer_id)?;
        if layer.is_group() {
            return Err(DocumentError::NotPaintable {
                layer_id,
                kind: LayerKind::Group,
            });
        }
        if layer.mask.is_some() {
            return Ok(());
        }
        self.ensure_unlocked(layer_id)?;
        let mut mask = self.pool.acquire(self.width, self.height)?;
        mask.fill(Rgba8::WHITE);
        let layer = &mut self.layers[layer_id];
        layer.mask = Some(mask);
        layer.touch();
        self.revision += 1;
        Ok(())
    }

    pub fn remove_mask(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        self.ensure_unlocked(layer_id)?;
        let layer = &mut self.layers[layer_id];
        let mask = layer.mask.take().ok_or(DocumentError::NoMask { layer_id })?;
        layer.touch();
        self.pool.release(mask);
        self.structure_changed();
        Ok(())
    }

    /// Bakes the mask into the layer's alpha and drops it. Vector and text
    /// layers become raster layers since their pixels no longer follow the
    /// source.
    pub fn apply_mask(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        self.ensure_unlocked(layer_id)?;
        let layer = &mut self.layers[layer_id];
        let kind = layer.kind;
        let Some(mask) = layer.mask.as_ref() else {
            return Err(DocumentError::NoMask { layer_id });
        };
        let buffer = layer
            .buffer
            .as_mut()
            .ok_or(DocumentError::NotPaintable { layer_id, kind })?;
        let baked = apply_mask(buffer, mask)?;
        buffer.copy_from(&baked)?;
        if matches!(kind, LayerKind::Vector | LayerKind::Text) {
            layer.kind = LayerKind::Raster;
            layer.source = None;
        }
        layer.touch();
        if let Some(mask) = layer.mask.take() {
            self.pool.release(mask);
        }
        self.structure_changed();
        Ok(())
    }

    /// Visible itself and through every enclosing group.
    fn is_effectively_visible(&self, layer_id: LayerId) -> bool {
        let mut current = Some(layer_id);
        while let Some(id) = current {
            let layer = &self.layers[id];
            if !layer.is_visible() {
                return false;
            }
            current = layer.parent;
        }
        true
    }

    fn unlink_and_remove(&mut self, layer_id: LayerId) {
        let (parent, index) = self.position(layer_id);
        self.siblings_mut(parent).remove(index);
        self.remove_subtree(layer_id);
    }
}

fn copy_top_left(source: &RasterBuffer, target: &mut RasterBuffer) {
    let columns = source.width().min(target.width()) as usize * BYTES_PER_PIXEL;
    for y in 0..source.height().min(target.height()) {
        target.row_mut(y)[..columns].copy_from_slice(&source.row(y)[..columns]);
    }
}
