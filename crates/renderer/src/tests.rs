use effects::{LayerEffect, ShadowParams};
use model::{BlendMode, DirtyRows, RasterBuffer, Rgba8};
use render_protocol::{LayerId, RenderNode, RenderTree};
use slotmap::SlotMap;

use super::*;

const SIZE: u32 = 16;

fn ids(count: usize) -> Vec<LayerId> {
    let mut keys: SlotMap<LayerId, ()> = SlotMap::with_key();
    (0..count).map(|_| keys.insert(())).collect()
}

fn solid(color: Rgba8) -> RasterBuffer {
    let mut buffer = RasterBuffer::new(SIZE, SIZE).expect("alloc layer");
    buffer.fill(color);
    buffer
}

fn leaf<'a>(layer_id: LayerId, buffer: &'a RasterBuffer, opacity: f32) -> RenderNode<'a> {
    RenderNode::Leaf {
        layer_id,
        buffer,
        mask: None,
        blend: BlendMode::Normal,
        opacity,
        effects: &[],
    }
}

fn tree<'a>(revision: u64, children: Vec<RenderNode<'a>>) -> RenderTree<'a> {
    RenderTree {
        revision,
        width: SIZE,
        height: SIZE,
        root: RenderNode::Group {
            group_id: None,
            blend: BlendMode::Normal,
            opacity: 1.0,
            children,
        },
    }
}

fn close(actual: Rgba8, expected: Rgba8) -> bool {
    actual.r.abs_diff(expected.r) <= 1
        && actual.g.abs_diff(expected.g) <= 1
        && actual.b.abs_diff(expected.b) <= 1
        && actual.a.abs_diff(expected.a) <= 1
}

#[test]
fn half_opacity_blue_over_red_is_purple() {
    let layer_ids = ids(2);
    let red = solid(Rgba8::opaque(255, 0, 0));
    let blue = solid(Rgba8::opaque(0, 0, 255));
    let tree = tree(1, vec![leaf(layer_ids[0], &red, 1.0), leaf(layer_ids[1], &blue, 0.5)]);

    let mut compositor = Compositor::new();
    let output = compositor
        .compose(&tree, &DirtyRows::full(SIZE))
        .expect("compose");
    let pixel = output.pixel(3, 7);
    assert!(close(pixel, Rgba8::new(127, 0, 127, 255)), "{pixel:?}");
}

#[test]
fn composing_twice_is_idempotent() {
    let layer_ids = ids(2);
    let red = solid(Rgba8::opaque(200, 10, 0));
    let mut green = RasterBuffer::new(SIZE, SIZE).expect("alloc");
    green.set_pixel(4, 4, Rgba8::new(0, 255, 0, 90));
    let nodes = vec![
        leaf(layer_ids[0], &red, 0.7),
        RenderNode::Leaf {
            layer_id: layer_ids[1],
            buffer: &green,
            mask: None,
            blend: BlendMode::Overlay,
            opacity: 0.9,
            effects: &[],
        },
    ];
    let tree = tree(5, nodes);

    let mut compositor = Compositor::new();
    let first = compositor
        .compose(&tree, &DirtyRows::full(SIZE))
        .expect("first")
        .as_bytes()
        .to_vec();
    assert_eq!(compositor.last_report(), CompositeReport::Full);
    let second = compositor
        .compose(&tree, &DirtyRows::clean(SIZE))
        .expect("second")
        .as_bytes()
        .to_vec();
    assert_eq!(compositor.last_report(), CompositeReport::Cached);
    assert_eq!(first, second);

    let mut fresh = Compositor::new();
    let third = fresh
        .compose(&tree, &DirtyRows::clean(SIZE))
        .expect("fresh")
        .as_bytes()
        .to_vec();
    assert_eq!(first, third);
}

#[test]
fn opaque_normal_stack_shows_top_layer() {
    let layer_ids = ids(3);
    let bottom = solid(Rgba8::opaque(10, 20, 30));
    let middle = solid(Rgba8::opaque(40, 50, 60));
    let mut top = solid(Rgba8::opaque(70, 80, 90));
    top.set_pixel(0, 0, Rgba8::opaque(1, 1, 1));
    let tree = tree(
        1,
        vec![
            leaf(layer_ids[0], &bottom, 1.0),
            leaf(layer_ids[1], &middle, 1.0),
            leaf(layer_ids[2], &top, 1.0),
        ],
    );
    let mut compositor = Compositor::new();
    let output = compositor
        .compose(&tree, &DirtyRows::full(SIZE))
        .expect("compose");
    assert_eq!(output.as_bytes(), top.as_bytes());
}

#[test]
fn reordering_changes_output() {
    let layer_ids = ids(2);
    let red = solid(Rgba8::opaque(255, 0, 0));
    let blue = solid(Rgba8::opaque(0, 0, 255));
    let mut compositor = Compositor::new();
    let forward = compositor
        .compose(
            &tree(1, vec![leaf(layer_ids[0], &red, 1.0), leaf(layer_ids[1], &blue, 1.0)]),
            &DirtyRows::full(SIZE),
        )
        .expect("forward")
        .pixel(2, 2);
    let backward = compositor
        .compose(
            &tree(2, vec![leaf(layer_ids[1], &blue, 1.0), leaf(layer_ids[0], &red, 1.0)]),
            &DirtyRows::full(SIZE),
        )
        .expect("backward")
        .pixel(2, 2);
    assert_eq!(forward, Rgba8::opaque(0, 0, 255));
    assert_eq!(backward, Rgba8::opaque(255, 0, 0));
}

#[test]
fn dirty_rows_recompose_only_those_rows() {
    let layer_ids = ids(2);
    let base = solid(Rgba8::opaque(0, 0, 0));
    let mut paint = RasterBuffer::new(SIZE, SIZE).expect("alloc");

    let mut compositor = Compositor::new();
    compositor
        .compose(
            &tree(1, vec![leaf(layer_ids[0], &base, 1.0), leaf(layer_ids[1], &paint, 1.0)]),
            &DirtyRows::full(SIZE),
        )
        .expect("initial");

    for x in 0..SIZE {
        paint.set_pixel(x, 6, Rgba8::opaque(255, 255, 255));
        paint.set_pixel(x, 7, Rgba8::opaque(255, 255, 255));
    }
    let mut dirty = DirtyRows::clean(SIZE);
    dirty.mark_span(6, 8);
    let updated = tree(2, vec![leaf(layer_ids[0], &base, 1.0), leaf(layer_ids[1], &paint, 1.0)]);
    let partial = compositor
        .compose(&updated, &dirty)
        .expect("partial")
        .as_bytes()
        .to_vec();
    assert_eq!(compositor.last_report(), CompositeReport::Partial { rows: 2 });

    let mut reference = RasterBuffer::new(SIZE, SIZE).expect("alloc");
    composite_tree_into(&mut reference, &updated).expect("reference");
    assert_eq!(partial, reference.as_bytes());
}

#[test]
fn revision_change_without_dirty_rows_recomposes_everything() {
    let layer_ids = ids(1);
    let red = solid(Rgba8::opaque(255, 0, 0));
    let mut compositor = Compositor::new();
    compositor
        .compose(&tree(1, vec![leaf(layer_ids[0], &red, 1.0)]), &DirtyRows::full(SIZE))
        .expect("initial");
    let output = compositor
        .compose(&tree(2, vec![leaf(layer_ids[0], &red, 0.0)]), &DirtyRows::clean(SIZE))
        .expect("property change");
    assert_eq!(output.alpha(0, 0), 0);
    assert_eq!(compositor.last_report(), CompositeReport::Full);
}

#[test]
fn groups_composite_isolated() {
    let layer_ids = ids(3);
    let red = solid(Rgba8::opaque(255, 0, 0));
    let blue = solid(Rgba8::opaque(0, 0, 255));
    let group = RenderNode::Group {
        group_id: Some(layer_ids[2]),
        blend: BlendMode::Normal,
        opacity: 0.5,
        children: vec![leaf(layer_ids[0], &red, 1.0), leaf(layer_ids[1], &blue, 1.0)],
    };
    let mut compositor = Compositor::new();
    let output = compositor
        .compose(&tree(1, vec![group]), &DirtyRows::full(SIZE))
        .expect("compose");
    // The group flattens to opaque blue first, then fades as a whole.
    assert!(close(output.pixel(1, 1), Rgba8::new(0, 0, 255, 128)));
}

#[test]
fn mask_hides_layer_where_transparent() {
    let layer_ids = ids(1);
    let red = solid(Rgba8::opaque(255, 0, 0));
    let mut mask = RasterBuffer::new(SIZE, SIZE).expect("alloc");
    for y in 0..SIZE {
        for x in SIZE / 2..SIZE {
            mask.set_pixel(x, y, Rgba8::WHITE);
        }
    }
    let node = RenderNode::Leaf {
        layer_id: layer_ids[0],
        buffer: &red,
        mask: Some(&mask),
        blend: BlendMode::Normal,
        opacity: 1.0,
        effects: &[],
    };
    let mut compositor = Compositor::new();
    let output = compositor
        .compose(&tree(1, vec![node]), &DirtyRows::full(SIZE))
        .expect("compose");
    assert_eq!(output.alpha(1, 1), 0);
    assert_eq!(output.pixel(SIZE - 1, 1), Rgba8::opaque(255, 0, 0));
}

#[test]
fn drop_shadow_renders_beneath_layer() {
    let layer_ids = ids(1);
    let mut square = RasterBuffer::new(SIZE, SIZE).expect("alloc");
    for y in 2..6 {
        for x in 2..6 {
            square.set_pixel(x, y, Rgba8::opaque(255, 255, 255));
        }
    }
    let effects = [LayerEffect::DropShadow(ShadowParams {
        offset_x: 4,
        offset_y: 4,
        blur_radius: 0,
        color: Rgba8::BLACK,
        opacity: 0.5,
    })];
    let node = RenderNode::Leaf {
        layer_id: layer_ids[0],
        buffer: &square,
        mask: None,
        blend: BlendMode::Normal,
        opacity: 1.0,
        effects: &effects,
    };
    let mut compositor = Compositor::new();
    let output = compositor
        .compose(&tree(1, vec![node]), &DirtyRows::clean(SIZE))
        .expect("compose");
    assert_eq!(output.pixel(3, 3), Rgba8::opaque(255, 255, 255));
    assert!(close(output.pixel(8, 8), Rgba8::new(0, 0, 0, 128)));
    assert_eq!(output.alpha(12, 12), 0);
}

#[test]
fn mismatched_layer_is_rejected() {
    let layer_ids = ids(1);
    let small = RasterBuffer::new(4, 4).expect("alloc");
    let mut compositor = Compositor::new();
    let render_tree = tree(1, vec![leaf(layer_ids[0], &small, 1.0)]);
    let result = compositor.compose(&render_tree, &DirtyRows::full(SIZE));
    assert!(matches!(result, Err(RenderError::Tree(_))));
    assert!(compositor.output().is_none());
}
