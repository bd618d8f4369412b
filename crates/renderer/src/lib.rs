//! CPU compositor.
//!
//! The compositor owns one output buffer and rebuilds it from a borrowed
//! [`RenderTree`]. Between compositions it remembers the tree revision it
//! last produced, so an unchanged tree is served from the cached output and a
//! tree whose pixels changed only in a few rows re-blends just those rows.
//!
//! Layer effects spread pixels beyond the rows that changed, so any tree
//! carrying effects is always recomposed in full.

mod composite;

use std::ops::Range;

use effects::EffectError;
use log::debug;
use model::{DirtyRows, RasterBuffer, RasterError};
use render_protocol::{RenderNode, RenderTree, RenderTreeError};

use composite::{ScratchBuffers, composite_node};

pub use composite::apply_mask;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Tree(#[from] RenderTreeError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Effect(#[from] EffectError),
}

/// How the last [`Compositor::compose`] call produced its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeReport {
    #[default]
    Idle,
    /// Nothing changed since the previous composition.
    Cached,
    Partial {
        rows: u32,
    },
    Full,
}

#[derive(Debug, Default)]
pub struct Compositor {
    output: Option<RasterBuffer>,
    revision: Option<u64>,
    scratch: ScratchBuffers,
    last_report: CompositeReport,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of the last successful composition.
    pub fn output(&self) -> Option<&RasterBuffer> {
        self.output.as_ref()
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub fn last_report(&self) -> CompositeReport {
        self.last_report
    }

    /// Drops the cached output and scratch buffers; the next composition
    /// starts from scratch.
    pub fn invalidate(&mut self) {
        self.output = None;
        self.revision = None;
        self.scratch.clear();
    }

    /// Composes `tree` back-to-front. `dirty` lists the rows whose pixels
    /// changed since the previous call; rows outside it are trusted to be up
    /// to date in the cached output.
    pub fn compose(
        &mut self,
        tree: &RenderTree<'_>,
        dirty: &DirtyRows,
    ) -> Result<&RasterBuffer, RenderError> {
        tree.validate()?;
        let size = (tree.width, tree.height);
        let cached = self
            .output
            .as_ref()
            .is_some_and(|output| output.dimensions() == size)
            && self.revision.is_some();

        if cached && dirty.is_clean() && self.revision == Some(tree.revision) {
            self.last_report = CompositeReport::Cached;
            return self.output.as_ref().ok_or(RenderError::Raster(RasterError::InvalidDimensions {
                width: tree.width,
                height: tree.height,
            }));
        }

        let full = !cached
            || dirty.height() != tree.height
            || dirty.is_full()
            || dirty.is_clean()
            || tree.has_effects();
        let spans: Vec<Range<u32>> = if full {
            vec![0..tree.height]
        } else {
            dirty.spans()
        };

        let mut output = match self.output.take() {
            Some(output) if output.dimensions() == size => output,
            _ => RasterBuffer::new(tree.width, tree.height)?,
        };
        self.revision = None;
        for span in &spans {
            output.clear_rows(span.clone());
        }
        composite_root(&mut output, &tree.root, &spans, &mut self.scratch)?;

        self.last_report = if full {
            CompositeReport::Full
        } else {
            CompositeReport::Partial {
                rows: spans.iter().map(|span| span.end - span.start).sum(),
            }
        };
        debug!(
            "composite revision {} leaves {} {:?}",
            tree.revision,
            tree.leaf_count(),
            self.last_report
        );
        self.revision = Some(tree.revision);
        Ok(self.output.insert(output))
    }
}

/// The synthetic root composites straight onto the target; only real
/// groups get an isolated scratch buffer.
fn composite_root(
    target: &mut RasterBuffer,
    root: &RenderNode<'_>,
    rows: &[Range<u32>],
    scratch: &mut ScratchBuffers,
) -> Result<(), RenderError> {
    match root {
        RenderNode::Group {
            group_id: None,
            children,
            ..
        } => {
            for child in children {
                composite_node(target, child, rows, scratch)?;
            }
            Ok(())
        }
        node => composite_node(target, node, rows, scratch),
    }
}

/// Composites the whole tree over the existing contents of `target`.
pub fn composite_tree_into(
    target: &mut RasterBuffer,
    tree: &RenderTree<'_>,
) -> Result<(), RenderError> {
    tree.validate()?;
    if target.dimensions() != (tree.width, tree.height) {
        return Err(RasterError::DimensionMismatch {
            expected: (tree.width, tree.height),
            actual: target.dimensions(),
        }
        .into());
    }
    let mut scratch = ScratchBuffers::default();
    composite_root(target, &tree.root, &[0..tree.height], &mut scratch)
}

#[cfg(test)]
mod tests;
