use driver::{DynamicsConfig, StrokeSample};
use model::{RasterBuffer, Rgba8};
use raster_pool::RasterPool;

use super::*;

fn canvas(pool: &mut RasterPool) -> RasterBuffer {
    pool.acquire(240, 60).expect("canvas")
}

fn hard_brush(size: f32, spacing: f32) -> BrushSettings {
    BrushSettings {
        size,
        spacing,
        hardness: 1.0,
        color: Rgba8::opaque(0, 0, 255),
        dynamics: DynamicsConfig::constant(),
        ..BrushSettings::default()
    }
}

#[test]
fn add_point_before_start_is_rejected() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    assert_eq!(
        rasterizer.add_point(StrokeSample::at(1.0, 1.0), &mut target),
        Err(BrushError::NoActiveStroke)
    );
}

#[test]
fn fast_segment_is_filled_with_interpolated_stamps() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    // 40px brush at 25% spacing stamps every 10px.
    rasterizer
        .start_stroke(&hard_brush(40.0, 0.25), &target, &mut pool)
        .expect("start");
    let first = rasterizer
        .add_point(StrokeSample::at(20.0, 30.0), &mut target)
        .expect("first point");
    assert_eq!(first.stamps.len(), 1);
    let segment = rasterizer
        .add_point(StrokeSample::at(220.0, 30.0), &mut target)
        .expect("second point");
    assert!(segment.stamps.len() >= 19, "got {}", segment.stamps.len());
    for pair in segment.stamps.windows(2) {
        assert!(pair[1].x - pair[0].x <= 10.0 + 1e-3);
    }
    for x in (20..=220).step_by(5) {
        assert_eq!(target.alpha(x, 30), 255, "gap at x={x}");
    }
    let summary = rasterizer.end_stroke(&mut pool).expect("summary");
    assert_eq!(summary.point_count, 2);
    assert_eq!(summary.stamp_count, 1 + segment.stamps.len());
}

#[test]
fn spacing_carries_across_short_segments() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    rasterizer
        .start_stroke(&hard_brush(40.0, 0.25), &target, &mut pool)
        .expect("start");
    let mut stamps = 0;
    for index in 0..=31 {
        let progress = rasterizer
            .add_point(StrokeSample::at(10.0 + index as f32 * 3.0, 30.0), &mut target)
            .expect("point");
        stamps += progress.stamps.len();
    }
    // 93px of travel at 10px spacing plus the initial stamp.
    assert_eq!(stamps, 10);
}

#[test]
fn stroke_settings_do_not_leak_into_next_stroke() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    rasterizer
        .start_stroke(&hard_brush(10.0, 0.25), &target, &mut pool)
        .expect("first start");
    rasterizer
        .add_point(StrokeSample::at(30.0, 30.0), &mut target)
        .expect("paint");
    rasterizer.end_stroke(&mut pool).expect("first end");

    let red = BrushSettings {
        color: Rgba8::opaque(255, 0, 0),
        ..hard_brush(10.0, 0.25)
    };
    rasterizer
        .start_stroke(&red, &target, &mut pool)
        .expect("second start");
    assert_eq!(
        rasterizer.active_settings().map(|settings| settings.color),
        Some(Rgba8::opaque(255, 0, 0))
    );
    rasterizer
        .add_point(StrokeSample::at(100.0, 30.0), &mut target)
        .expect("paint");
    assert_eq!(target.pixel(100, 30), Rgba8::opaque(255, 0, 0));
    assert_eq!(target.pixel(30, 30), Rgba8::opaque(0, 0, 255));
}

#[test]
fn starting_twice_requires_ending_first() {
    let mut pool = RasterPool::new();
    let target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    rasterizer
        .start_stroke(&BrushSettings::default(), &target, &mut pool)
        .expect("start");
    let leased = pool.stats().active_count;
    assert_eq!(
        rasterizer.start_stroke(&BrushSettings::default(), &target, &mut pool),
        Err(BrushError::StrokeAlreadyActive)
    );
    assert_eq!(pool.stats().active_count, leased);
}

#[test]
fn end_without_points_changes_nothing_and_returns_snapshot() {
    let mut pool = RasterPool::new();
    let target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    assert!(rasterizer.end_stroke(&mut pool).is_none());
    rasterizer
        .start_stroke(&BrushSettings::default(), &target, &mut pool)
        .expect("start");
    assert_eq!(pool.stats().active_count, 2);
    let summary = rasterizer.end_stroke(&mut pool).expect("summary");
    assert_eq!(summary.point_count, 0);
    assert!(target.is_transparent());
    assert_eq!(pool.stats().active_count, 1);
    assert_eq!(pool.stats().pooled_count, 1);
}

#[test]
fn abort_restores_pre_stroke_pixels() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    target.set_pixel(5, 5, Rgba8::opaque(1, 2, 3));
    let mut rasterizer = BrushRasterizer::new();
    rasterizer
        .start_stroke(&hard_brush(16.0, 0.25), &target, &mut pool)
        .expect("start");
    rasterizer
        .add_point(StrokeSample::at(50.0, 30.0), &mut target)
        .expect("paint");
    rasterizer
        .add_point(StrokeSample::at(150.0, 30.0), &mut target)
        .expect("paint");
    assert!(target.alpha(100, 30) > 0);

    rasterizer.abort_stroke(&mut target, &mut pool).expect("abort");
    assert_eq!(target.alpha(100, 30), 0);
    assert_eq!(target.pixel(5, 5), Rgba8::opaque(1, 2, 3));
    assert!(!rasterizer.is_stroke_active());
    assert_eq!(
        rasterizer.abort_stroke(&mut target, &mut pool),
        Err(BrushError::NoActiveStroke)
    );
}

#[test]
fn mismatched_target_is_rejected() {
    let mut pool = RasterPool::new();
    let target = canvas(&mut pool);
    let mut other = RasterBuffer::new(10, 10).expect("other");
    let mut rasterizer = BrushRasterizer::new();
    rasterizer
        .start_stroke(&BrushSettings::default(), &target, &mut pool)
        .expect("start");
    assert!(matches!(
        rasterizer.add_point(StrokeSample::at(1.0, 1.0), &mut other),
        Err(BrushError::Raster(_))
    ));
}

#[test]
fn pressure_dynamics_shrink_stamps() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    let settings = BrushSettings {
        dynamics: DynamicsConfig {
            pressure_size: true,
            ..DynamicsConfig::constant()
        },
        ..hard_brush(20.0, 0.25)
    };
    rasterizer
        .start_stroke(&settings, &target, &mut pool)
        .expect("start");
    let light = rasterizer
        .add_point(
            StrokeSample {
                pressure: 0.25,
                ..StrokeSample::at(40.0, 30.0)
            },
            &mut target,
        )
        .expect("light");
    assert_eq!(light.stamps[0].size, 5.0);
    assert_eq!(target.alpha(40, 30), 255);
    assert_eq!(target.alpha(40, 38), 0);
}

#[test]
fn far_reaching_segment_only_stamps_near_the_canvas() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    // 4px brush at 25% spacing: one stamp per pixel of travel.
    rasterizer
        .start_stroke(&hard_brush(4.0, 0.25), &target, &mut pool)
        .expect("start");
    rasterizer
        .add_point(StrokeSample::at(-1e8, 30.0), &mut target)
        .expect("first point");
    let segment = rasterizer
        .add_point(StrokeSample::at(1e8, 30.0), &mut target)
        .expect("second point");
    assert!(segment.stamps.len() < 300, "got {}", segment.stamps.len());
    assert!(segment.stamps.iter().all(|stamp| stamp.x > -20.0 && stamp.x < 260.0));
    for x in (0..240).step_by(4) {
        assert_eq!(target.alpha(x, 30), 255, "gap at x={x}");
    }
    assert!(segment.dirty_rows.is_some());
}

#[test]
fn off_canvas_travel_keeps_the_stamp_grid() {
    let mut pool = RasterPool::new();
    let mut target = canvas(&mut pool);
    let mut rasterizer = BrushRasterizer::new();
    rasterizer
        .start_stroke(&hard_brush(40.0, 0.25), &target, &mut pool)
        .expect("start");
    rasterizer
        .add_point(StrokeSample::at(-1000.0, 30.0), &mut target)
        .expect("first point");
    let segment = rasterizer
        .add_point(StrokeSample::at(200.0, 30.0), &mut target)
        .expect("second point");
    assert!(!segment.stamps.is_empty());
    for stamp in &segment.stamps {
        assert!((stamp.x / 10.0 - (stamp.x / 10.0).round()).abs() < 1e-4, "x={}", stamp.x);
    }
    assert_eq!(segment.stamps.last().map(|stamp| stamp.x), Some(200.0));

    let away = rasterizer
        .add_point(StrokeSample::at(200.0, 5000.0), &mut target)
        .expect("leave canvas");
    let beyond = rasterizer
        .add_point(StrokeSample::at(900.0, 5000.0), &mut target)
        .expect("off canvas");
    assert!(beyond.stamps.is_empty());
    assert!(!away.stamps.is_empty());
    assert!(away.stamps.iter().all(|stamp| stamp.y < 150.0));
}
