use effects::{LayerEffect, ShadowParams};
use model::{BlendMode, Rgba8};
use render_protocol::{LayerKind, ToolTag};
use renderer::composite_tree_into;

use super::*;

fn document() -> Document {
    Document::new(8, 8).expect("document")
}

fn fill_layer(document: &mut Document, layer_id: LayerId, color: Rgba8) {
    let mut target = document.paint_target(layer_id).expect("paint target");
    target.buffer.fill(color);
    let height = document.height();
    document.mark_painted(layer_id, 0..height).expect("mark");
}

fn composite(document: &Document) -> RasterBuffer {
    let (width, height) = document.dimensions();
    let mut output = RasterBuffer::new(width, height).expect("alloc");
    composite_tree_into(&mut output, &document.render_tree()).expect("composite");
    output
}

#[test]
fn new_layers_stack_above_active() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    document.select(a).expect("select");
    let c = document.create_layer("c", LayerKind::Raster).expect("c");
    assert_eq!(document.root_order(), &[a, c, b]);
    assert_eq!(document.active_layer(), Some(c));
}

#[test]
fn deleting_active_layer_activates_neighbour() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    let c = document.create_layer("c", LayerKind::Raster).expect("c");
    document.select(b).expect("select");
    document.delete_layer(b).expect("delete");
    assert_eq!(document.root_order(), &[a, c]);
    assert_eq!(document.active_layer(), Some(c));

    document.delete_layer(c).expect("delete top");
    assert_eq!(document.active_layer(), Some(a));
    document.delete_layer(a).expect("delete last");
    assert_eq!(document.active_layer(), None);
    assert_eq!(document.layer_count(), 0);
}

#[test]
fn unknown_layer_is_reported() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    document.delete_layer(a).expect("delete");
    assert_eq!(
        document.set_opacity(a, 0.5),
        Err(DocumentError::LayerNotFound { layer_id: a })
    );
    assert!(matches!(
        document.delete_layer(a),
        Err(DocumentError::LayerNotFound { .. })
    ));
}

#[test]
fn opacity_is_clamped_and_non_finite_ignored() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    document.set_opacity(a, 1.7).expect("clamp high");
    assert_eq!(document.layer(a).expect("a").opacity(), 1.0);
    document.set_opacity(a, -0.3).expect("clamp low");
    assert_eq!(document.layer(a).expect("a").opacity(), 0.0);
    document.set_opacity(a, f32::NAN).expect("nan");
    assert_eq!(document.layer(a).expect("a").opacity(), 0.0);
}

#[test]
fn mutations_bump_revision_and_dirty_rows() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    document.take_dirty_rows();
    let before = document.revision();
    document.mark_painted(a, 2..4).expect("mark");
    assert!(document.revision() > before);
    let dirty = document.take_dirty_rows();
    assert_eq!(dirty.dirty_count(), 2);
    assert!(dirty.is_row_dirty(3));
    assert!(document.dirty_rows().is_clean());
}

#[test]
fn moving_group_into_itself_is_rejected() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let outer = document.create_group("outer", &[a]).expect("outer");
    let inner = document.create_group("inner", &[a]).expect("inner");
    assert_eq!(
        document.move_layer(outer, Some(inner), 0),
        Err(DocumentError::GroupCycle {
            layer_id: outer,
            group_id: inner
        })
    );
    assert_eq!(
        document.add_to_group(outer, a),
        Err(DocumentError::NotAGroup { layer_id: a })
    );
    assert_eq!(document.root_order(), &[outer]);
}

#[test]
fn grouping_across_levels_is_rejected() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    document.create_group("g", &[a]).expect("group");
    assert_eq!(document.create_group("bad", &[a, b]), Err(DocumentError::NotSameLevel));
}

#[test]
fn group_delete_policies() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    let c = document.create_layer("c", LayerKind::Raster).expect("c");
    let group = document.create_group("g", &[a, b]).expect("group");
    document
        .delete_group(group, GroupDeletePolicy::PromoteMembers)
        .expect("promote");
    assert_eq!(document.root_order(), &[a, b, c]);
    assert_eq!(document.layer(a).expect("a").parent(), None);

    let group = document.create_group("g", &[a, b]).expect("group");
    document
        .delete_group(group, GroupDeletePolicy::DeleteMembers)
        .expect("delete");
    assert_eq!(document.root_order(), &[c]);
    assert!(!document.contains(a));
    assert!(!document.contains(b));
}

#[test]
fn deleted_layers_return_buffers_to_pool() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    document.create_layer("b", LayerKind::Raster).expect("b");
    assert_eq!(document.pool_stats().active_count, 2);
    document.delete_layer(a).expect("delete");
    let stats = document.pool_stats();
    assert_eq!(stats.active_count, 1);
    assert_eq!(stats.pooled_count, 1);
    document.create_layer("c", LayerKind::Raster).expect("c");
    assert_eq!(document.pool_stats().pooled_count, 0);
}

#[test]
fn duplicate_copies_pixels_above_original() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    fill_layer(&mut document, a, Rgba8::opaque(9, 8, 7));
    document.set_opacity(a, 0.4).expect("opacity");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    let copy = document.duplicate_layer(a).expect("duplicate");
    assert_eq!(document.root_order(), &[a, copy, b]);
    let duplicated = document.layer(copy).expect("copy");
    assert_eq!(duplicated.name(), "a copy");
    assert_eq!(duplicated.opacity(), 0.4);
    assert_eq!(
        duplicated.buffer().expect("pixels").pixel(3, 3),
        Rgba8::opaque(9, 8, 7)
    );
    assert_eq!(document.active_layer(), Some(copy));
}

#[test]
fn duplicating_group_copies_members() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let group = document.create_group("g", &[a]).expect("group");
    let copy = document.duplicate_layer(group).expect("duplicate");
    let members = document.layer(copy).expect("copy").children().to_vec();
    assert_eq!(members.len(), 1);
    assert_ne!(members[0], a);
    assert_eq!(document.layer(members[0]).expect("member").parent(), Some(copy));
    assert_eq!(document.render_order().len(), 2);
}

#[test]
fn locked_layers_refuse_paint() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    document.set_locked(a, true).expect("lock");
    assert!(matches!(
        document.paint_target(a),
        Err(DocumentError::LayerLocked { .. })
    ));
    let v = document
        .create_vector_layer(
            "v",
            VectorShape::Rectangle {
                x: 0.0,
                y: 0.0,
                width: 2.0,
                height: 2.0,
                fill: Some(Rgba8::BLACK),
                stroke: None,
            },
        )
        .expect("vector");
    assert!(matches!(
        document.paint_target(v),
        Err(DocumentError::NotPaintable {
            kind: LayerKind::Vector,
            ..
        })
    ));
}

#[test]
fn hidden_layers_are_left_out_of_render_tree() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    document.set_visible(a, false).expect("hide");
    let tree = document.render_tree();
    assert_eq!(tree.leaf_count(), 1);
    match &tree.root {
        RenderNode::Group { children, .. } => {
            assert!(matches!(children[0], RenderNode::Leaf { layer_id, .. } if layer_id == b));
        }
        RenderNode::Leaf { .. } => panic!("root must be a group"),
    }
}

#[test]
fn height_sources_follow_height_and_visibility() {
    let mut document = document();
    let flat = document.create_layer("flat", LayerKind::Raster).expect("flat");
    let puff = document.create_tool_layer(ToolTag::Puff).expect("puff");
    let hidden = document.create_layer("hidden", LayerKind::Raster).expect("hidden");
    document.set_height(puff, Some(2.0)).expect("height");
    document.set_curvature(puff, Some(0.5)).expect("curvature");
    document.set_height(hidden, Some(1.0)).expect("height");
    document.set_visible(hidden, false).expect("hide");
    document.set_height(flat, Some(0.0)).expect("zero");

    let sources = document.height_sources();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].layer_id, puff);
    assert_eq!(sources[0].height, 2.0);
    assert_eq!(sources[0].curvature, 0.5);
    assert_eq!(document.find_tool_layer(ToolTag::Puff), Some(puff));
    assert_eq!(document.layer(puff).expect("puff").kind(), LayerKind::Puff);
}

#[test]
fn merge_composites_into_lowest_layer() {
    let mut document = document();
    let red = document.create_layer("red", LayerKind::Raster).expect("red");
    fill_layer(&mut document, red, Rgba8::opaque(255, 0, 0));
    let blue = document.create_layer("blue", LayerKind::Raster).expect("blue");
    fill_layer(&mut document, blue, Rgba8::opaque(0, 0, 255));
    document.set_opacity(blue, 0.5).expect("opacity");
    let top = document.create_layer("top", LayerKind::Raster).expect("top");

    let merged = document.merge(&[blue, red]).expect("merge");
    assert_eq!(merged, red);
    assert_eq!(document.root_order(), &[red, top]);
    let layer = document.layer(red).expect("merged");
    assert_eq!(layer.name(), "red");
    assert_eq!(layer.opacity(), 1.0);
    assert_eq!(layer.blend_mode(), BlendMode::Normal);
    let pixel = layer.buffer().expect("pixels").pixel(1, 1);
    assert!(pixel.r.abs_diff(127) <= 1 && pixel.b.abs_diff(127) <= 1, "{pixel:?}");
    assert_eq!(document.pool_stats().active_count, 2);
}

#[test]
fn merge_refuses_locked_layers() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    document.set_locked(b, true).expect("lock");
    assert_eq!(document.merge(&[a, b]), Err(DocumentError::LayerLocked { layer_id: b }));
    assert_eq!(document.layer_count(), 2);
}

#[test]
fn merging_group_removes_it() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let b = document.create_layer("b", LayerKind::Raster).expect("b");
    let c = document.create_layer("c", LayerKind::Raster).expect("c");
    let group = document.create_group("g", &[b, c]).expect("group");
    let merged = document.merge(&[a, group]).expect("merge");
    assert_eq!(merged, a);
    assert_eq!(document.root_order(), &[a]);
    assert_eq!(document.layer_count(), 1);
}

#[test]
fn flatten_keeps_only_visible_content() {
    let mut document = document();
    let base = document.create_layer("base", LayerKind::Raster).expect("base");
    fill_layer(&mut document, base, Rgba8::opaque(0, 255, 0));
    let hidden = document.create_layer("hidden", LayerKind::Raster).expect("hidden");
    fill_layer(&mut document, hidden, Rgba8::opaque(255, 0, 0));
    document.set_visible(hidden, false).expect("hide");
    let expected = composite(&document);

    let flat = document.flatten_all().expect("flatten");
    assert_eq!(document.root_order(), &[flat]);
    assert_eq!(document.layer_count(), 1);
    let layer = document.layer(flat).expect("flat");
    assert_eq!(layer.buffer().expect("pixels").as_bytes(), expected.as_bytes());
    assert_eq!(layer.buffer().expect("pixels").pixel(0, 0), Rgba8::opaque(0, 255, 0));
}

#[test]
fn resize_preserves_content_top_left() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let mut target = document.paint_target(a).expect("target");
    target.buffer.set_pixel(1, 2, Rgba8::opaque(5, 6, 7));
    target.buffer.set_pixel(7, 7, Rgba8::opaque(1, 1, 1));
    document.add_mask(a).expect("mask");

    document.resize(12, 4).expect("resize");
    assert_eq!(document.dimensions(), (12, 4));
    let layer = document.layer(a).expect("a");
    let buffer = layer.buffer().expect("pixels");
    assert_eq!(buffer.dimensions(), (12, 4));
    assert_eq!(buffer.pixel(1, 2), Rgba8::opaque(5, 6, 7));
    assert_eq!(buffer.alpha(10, 1), 0);
    assert_eq!(layer.mask().expect("mask").alpha(10, 1), 255);
    assert!(document.dirty_rows().is_full());
    assert_eq!(document.dirty_rows().height(), 4);
    assert_eq!(document.pool_stats().active_count, 2);
}

#[test]
fn resize_to_zero_changes_nothing() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let revision = document.revision();
    assert_eq!(
        document.resize(0, 5),
        Err(DocumentError::InvalidDimensions { width: 0, height: 5 })
    );
    assert_eq!(document.dimensions(), (8, 8));
    assert_eq!(document.revision(), revision);
    assert_eq!(document.layer(a).expect("a").buffer().expect("pixels").width(), 8);
}

#[test]
fn resize_redraws_vector_layers() {
    let mut document = document();
    let shape = VectorShape::Rectangle {
        x: 0.0,
        y: 0.0,
        width: 16.0,
        height: 16.0,
        fill: Some(Rgba8::WHITE),
        stroke: None,
    };
    let v = document.create_vector_layer("v", shape).expect("vector");
    document.resize(16, 16).expect("resize");
    let buffer = document.layer(v).expect("v").buffer().expect("pixels");
    assert_eq!(buffer.alpha(12, 12), 255);
}

#[test]
fn rasterize_drops_editable_source() {
    let mut document = document();
    let text_pixels = RasterBuffer::new(8, 8).expect("alloc");
    let t = document
        .create_text_layer("t", "hello", &text_pixels)
        .expect("text");
    assert!(matches!(document.layer(t).expect("t").source(), Some(LayerSource::Text(_))));
    document.rasterize(t).expect("rasterize");
    let layer = document.layer(t).expect("t");
    assert_eq!(layer.kind(), LayerKind::Raster);
    assert!(layer.source().is_none());

    let group = document.create_group("g", &[t]).expect("group");
    assert!(matches!(
        document.rasterize(group),
        Err(DocumentError::NotPaintable { .. })
    ));
}

#[test]
fn applying_mask_bakes_alpha() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    fill_layer(&mut document, a, Rgba8::opaque(200, 0, 0));
    assert_eq!(document.apply_mask(a), Err(DocumentError::NoMask { layer_id: a }));
    document.add_mask(a).expect("mask");
    document.mask_target(a).expect("mask target").set_pixel(0, 0, Rgba8::TRANSPARENT);
    document.apply_mask(a).expect("apply");
    let layer = document.layer(a).expect("a");
    assert!(layer.mask().is_none());
    let buffer = layer.buffer().expect("pixels");
    assert_eq!(buffer.alpha(0, 0), 0);
    assert_eq!(buffer.alpha(1, 0), 255);
    assert_eq!(document.pool_stats().active_count, 1);
}

#[test]
fn effects_are_rejected_on_groups() {
    let mut document = document();
    let a = document.create_layer("a", LayerKind::Raster).expect("a");
    let group = document.create_group("g", &[a]).expect("group");
    let shadow = LayerEffect::DropShadow(ShadowParams {
        offset_x: 1,
        offset_y: 1,
        blur_radius: 0,
        color: Rgba8::BLACK,
        opacity: 0.5,
    });
    assert!(document.set_effects(group, vec![shadow.clone()]).is_err());
    document.set_effects(a, vec![shadow]).expect("effects");
    assert!(document.render_tree().has_effects());
}
