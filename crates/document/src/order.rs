//! Ordering and grouping.

use log::debug;
use render_protocol::{LayerId, LayerKind};

use crate::layer::Layer;
use crate::{Document, DocumentError, GroupDeletePolicy};

impl Document {
    /// Moves a layer into `parent` (the root when `None`) at `index` among
    /// its new siblings, clamped to the end.
    pub fn move_layer(
        &mut self,
        layer_id: LayerId,
        parent: Option<LayerId>,
        index: usize,
    ) -> Result<(), DocumentError> {
        self.layer(layer_id)?;
        if let Some(group_id) = parent {
            self.ensure_group(group_id)?;
            if self.is_descendant(group_id, layer_id) {
                return Err(DocumentError::GroupCycle { layer_id, group_id });
            }
        }
        self.detach(layer_id);
        let siblings = self.siblings_mut(parent);
        let index = index.min(siblings.len());
        siblings.insert(index, layer_id);
        self.layers[layer_id].parent = parent;
        self.structure_changed();
        Ok(())
    }

    /// One step towards the front within the layer's siblings. At the top
    /// this does nothing.
    pub fn move_up(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        self.layer(layer_id)?;
        let (parent, index) = self.position(layer_id);
        let siblings = self.siblings_mut(parent);
        if index + 1 < siblings.len() {
            siblings.swap(index, index + 1);
            self.structure_changed();
        }
        Ok(())
    }

    pub fn move_down(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        self.layer(layer_id)?;
        let (parent, index) = self.position(layer_id);
        if index > 0 {
            self.siblings_mut(parent).swap(index, index - 1);
            self.structure_changed();
        }
        Ok(())
    }

    pub fn bring_to_front(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        self.layer(layer_id)?;
        let (parent, index) = self.position(layer_id);
        let siblings = self.siblings_mut(parent);
        if index + 1 < siblings.len() {
            let id = siblings.remove(index);
            siblings.push(id);
            self.structure_changed();
        }
        Ok(())
    }

    pub fn send_to_back(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        self.layer(layer_id)?;
        let (parent, index) = self.position(layer_id);
        if index > 0 {
            let siblings = self.siblings_mut(parent);
            let id = siblings.remove(index);
            siblings.insert(0, id);
            self.structure_changed();
        }
        Ok(())
    }

    /// Wraps `members` in a new group placed where the frontmost member was.
    /// Members must share a parent and keep their relative order. With no
    /// members the empty group goes above the active layer.
    pub fn create_group(
        &mut self,
        name: impl Into<String>,
        members: &[LayerId],
    ) -> Result<LayerId, DocumentError> {
        for &member in members {
            self.layer(member)?;
        }
        let Some(&first) = members.first() else {
            let group = self
                .layers
                .insert_with_key(|id| Layer::new(id, name.into(), LayerKind::Group, None));
            self.insert_above_active(group);
            self.active = Some(group);
            self.structure_changed();
            return Ok(group);
        };
        let parent = self.layers[first].parent;
        if members.iter().any(|member| self.layers[*member].parent != parent) {
            return Err(DocumentError::NotSameLevel);
        }

        let ordered: Vec<LayerId> = self
            .siblings(parent)
            .iter()
            .copied()
            .filter(|id| members.contains(id))
            .collect();
        let insert_at = self
            .siblings(parent)
            .iter()
            .rposition(|id| members.contains(id))
            .map_or(0, |index| index + 1 - ordered.len());

        let group = self
            .layers
            .insert_with_key(|id| Layer::new(id, name.into(), LayerKind::Group, None));
        self.siblings_mut(parent).retain(|id| !ordered.contains(id));
        self.siblings_mut(parent).insert(insert_at, group);
        for &member in &ordered {
            self.layers[member].parent = Some(group);
        }
        let group_layer = &mut self.layers[group];
        group_layer.parent = parent;
        group_layer.children = ordered;
        self.structure_changed();
        debug!("grouped {} layers into {:?}", members.len(), group);
        Ok(group)
    }

    /// Moves a layer to the front of `group`.
    pub fn add_to_group(
        &mut self,
        layer_id: LayerId,
        group_id: LayerId,
    ) -> Result<(), DocumentError> {
        let end = self.ensure_group(group_id)?.children.len();
        self.move_layer(layer_id, Some(group_id), end)
    }

    /// Moves a grouped layer out to directly above its group. Top-level
    /// layers are left where they are.
    pub fn remove_from_group(&mut self, layer_id: LayerId) -> Result<(), DocumentError> {
        let Some(group_id) = self.layer(layer_id)?.parent else {
            return Ok(());
        };
        let (group_parent, group_index) = self.position(group_id);
        self.detach(layer_id);
        self.siblings_mut(group_parent).insert(group_index + 1, layer_id);
        self.layers[layer_id].parent = group_parent;
        self.structure_changed();
        Ok(())
    }

    pub fn delete_group(
        &mut self,
        group_id: LayerId,
        policy: GroupDeletePolicy,
    ) -> Result<(), DocumentError> {
        self.ensure_group(group_id)?;
        let (parent, index) = self.position(group_id);
        match policy {
            GroupDeletePolicy::DeleteMembers => {
                self.siblings_mut(parent).remove(index);
                self.remove_subtree(group_id);
            }
            GroupDeletePolicy::PromoteMembers => {
                let members = std::mem::take(&mut self.layers[group_id].children);
                for &member in &members {
                    self.layers[member].parent = parent;
                }
                let siblings = self.siblings_mut(parent);
                siblings.remove(index);
                for (offset, member) in members.into_iter().enumerate() {
                    siblings.insert(index + offset, member);
                }
                self.remove_subtree(group_id);
            }
        }
        self.repair_active(parent, index);
        self.structure_changed();
        debug!("deleted group {:?} ({:?})", group_id, policy);
        Ok(())
    }

    fn ensure_group(&self, layer_id: LayerId) -> Result<&Layer, DocumentError> {
        let layer = self.layer(layer_id)?;
        if !layer.is_group() {
            return Err(DocumentError::NotAGroup { layer_id });
        }
        Ok(layer)
    }

    /// Removes a live layer from its parent's order without dropping it.
    fn detach(&mut self, layer_id: LayerId) {
        let (parent, index) = self.position(layer_id);
        self.siblings_mut(parent).remove(index);
        self.layers[layer_id].parent = None;
    }
}
