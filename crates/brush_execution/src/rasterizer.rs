use std::ops::Range;

use driver::{StrokeSample, compute_dynamics};
use log::debug;
use model::{RasterBuffer, RasterError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use raster_pool::RasterPool;
use smallvec::SmallVec;

use crate::BrushError;
use crate::settings::BrushSettings;
use crate::stamp::{Stamp, render_stamp};

/// Largest factor pressure, tilt and jitter dynamics can apply to the size.
const MAX_DYNAMIC_SIZE_SCALE: f32 = 3.0;
/// Segments needing more on-canvas stamps than this are thinned evenly.
const MAX_SEGMENT_STAMPS: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrokeId(u64);

impl StrokeId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// What one `add_point` call placed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeProgress {
    pub stamps: SmallVec<[Stamp; 8]>,
    pub dirty_rows: Option<Range<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeSummary {
    pub stroke_id: StrokeId,
    pub point_count: usize,
    pub stamp_count: usize,
}

#[derive(Debug)]
struct ActiveStroke {
    id: StrokeId,
    settings: BrushSettings,
    snapshot: RasterBuffer,
    rng: StdRng,
    last_point: Option<StrokeSample>,
    /// Path length travelled since the last stamp.
    distance_since_stamp: f32,
    point_count: usize,
    stamp_count: usize,
}

/// Stamps strokes onto a target buffer as points arrive.
///
/// Painting happens straight on the target for live preview. A copy of the
/// target leased from the pool at stroke start lets [`abort_stroke`] put the
/// pixels back.
///
/// [`abort_stroke`]: BrushRasterizer::abort_stroke
#[derive(Debug, Default)]
pub struct BrushRasterizer {
    next_stroke_id: u64,
    active: Option<ActiveStroke>,
}

impl BrushRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stroke_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_settings(&self) -> Option<&BrushSettings> {
        self.active.as_ref().map(|stroke| &stroke.settings)
    }

    pub fn start_stroke(
        &mut self,
        settings: &BrushSettings,
        target: &RasterBuffer,
        pool: &mut RasterPool,
    ) -> Result<StrokeId, BrushError> {
        if self.active.is_some() {
            return Err(BrushError::StrokeAlreadyActive);
        }
        let snapshot = pool.acquire_copy(target)?;
        self.next_stroke_id += 1;
        let id = StrokeId(self.next_stroke_id);
        let settings = settings.sanitized();
        debug!(
            "stroke {} start size {:.1} spacing {:.2}px",
            id.0,
            settings.size,
            settings.spacing_pixels()
        );
        self.active = Some(ActiveStroke {
            id,
            rng: StdRng::seed_from_u64(settings.seed ^ id.0),
            settings,
            snapshot,
            last_point: None,
            distance_since_stamp: 0.0,
            point_count: 0,
            stamp_count: 0,
        });
        Ok(id)
    }

    /// Appends a point and stamps the segment from the previous point so that
    /// consecutive stamps are never further apart than the spacing.
    pub fn add_point(
        &mut self,
        point: StrokeSample,
        target: &mut RasterBuffer,
    ) -> Result<StrokeProgress, BrushError> {
        let stroke = self.active.as_mut().ok_or(BrushError::NoActiveStroke)?;
        if target.dimensions() != stroke.snapshot.dimensions() {
            return Err(RasterError::DimensionMismatch {
                expected: stroke.snapshot.dimensions(),
                actual: target.dimensions(),
            }
            .into());
        }
        if !point.x.is_finite() || !point.y.is_finite() {
            return Ok(StrokeProgress::default());
        }
        stroke.point_count += 1;

        let mut progress = StrokeProgress::default();
        let Some(previous) = stroke.last_point.replace(point) else {
            stroke.place(point, target, &mut progress);
            return Ok(progress);
        };

        let spacing = f64::from(stroke.settings.spacing_pixels());
        let dx = f64::from(point.x) - f64::from(previous.x);
        let dy = f64::from(point.y) - f64::from(previous.y);
        let length = dx.hypot(dy);
        if length <= f64::from(f32::EPSILON) {
            return Ok(progress);
        }
        // Stamps fall at `first + i * spacing` along the segment.
        let first = spacing - f64::from(stroke.distance_since_stamp);
        if first > length {
            stroke.distance_since_stamp += length as f32;
            return Ok(progress);
        }
        let last_index = ((length - first) / spacing).floor();

        let radius = f64::from(stroke.settings.size * 0.5 * MAX_DYNAMIC_SIZE_SCALE);
        let reach = radius * std::f64::consts::SQRT_2 + 1.0;
        let (width, height) = target.dimensions();
        let visible = clip_segment(
            (f64::from(previous.x), f64::from(previous.y)),
            (dx, dy),
            (-reach, -reach),
            (f64::from(width) + reach, f64::from(height) + reach),
        );
        if let Some((enter, exit)) = visible {
            let low = ((enter * length - first) / spacing).ceil().max(0.0);
            let high = ((exit * length - first) / spacing).floor().min(last_index);
            if low <= high {
                let (low, high) = (low as u64, high as u64);
                let stride = ((high - low) / MAX_SEGMENT_STAMPS).max(1);
                let mut index = low;
                while index <= high {
                    let along = first + index as f64 * spacing;
                    let sample = interpolate(&previous, &point, along / length);
                    stroke.place(sample, target, &mut progress);
                    index += stride;
                }
            }
        }
        stroke.distance_since_stamp = ((length - first) % spacing) as f32;
        Ok(progress)
    }

    /// Finishes the stroke; the painted pixels stay. Without an active stroke
    /// this does nothing.
    pub fn end_stroke(&mut self, pool: &mut RasterPool) -> Option<StrokeSummary> {
        let stroke = self.active.take()?;
        pool.release(stroke.snapshot);
        debug!(
            "stroke {} end points {} stamps {}",
            stroke.id.0, stroke.point_count, stroke.stamp_count
        );
        Some(StrokeSummary {
            stroke_id: stroke.id,
            point_count: stroke.point_count,
            stamp_count: stroke.stamp_count,
        })
    }

    /// Discards the stroke and restores the target to its pre-stroke pixels.
    pub fn abort_stroke(
        &mut self,
        target: &mut RasterBuffer,
        pool: &mut RasterPool,
    ) -> Result<StrokeSummary, BrushError> {
        let stroke = self.active.take().ok_or(BrushError::NoActiveStroke)?;
        let restored = target.copy_from(&stroke.snapshot);
        let summary = StrokeSummary {
            stroke_id: stroke.id,
            point_count: stroke.point_count,
            stamp_count: stroke.stamp_count,
        };
        pool.release(stroke.snapshot);
        restored?;
        debug!("stroke {} aborted", summary.stroke_id.0);
        Ok(summary)
    }
}

impl ActiveStroke {
    fn place(
        &mut self,
        sample: StrokeSample,
        target: &mut RasterBuffer,
        progress: &mut StrokeProgress,
    ) {
        self.distance_since_stamp = 0.0;
        let settings = &self.settings;
        let dynamics = compute_dynamics(&sample, &settings.dynamics, &mut self.rng);
        let jitter = if settings.angle_jitter_degrees > 0.0 {
            self.rng
                .random_range(-settings.angle_jitter_degrees..=settings.angle_jitter_degrees)
        } else {
            0.0
        };
        let stamp = Stamp {
            x: sample.x,
            y: sample.y,
            size: settings.size * dynamics.size,
            alpha: (settings.opacity * dynamics.opacity) * (settings.flow * dynamics.flow),
            angle_radians: (settings.angle_degrees + jitter).to_radians(),
        };
        self.stamp_count += 1;
        if let Some(rows) = render_stamp(target, &stamp, settings) {
            progress.dirty_rows = Some(match progress.dirty_rows.take() {
                Some(existing) => existing.start.min(rows.start)..existing.end.max(rows.end),
                None => rows,
            });
        }
        progress.stamps.push(stamp);
    }
}

/// Parameter range `[enter, exit]` within `[0, 1]` of `origin + t * delta`
/// that lies inside the rectangle spanned by `min` and `max`.
fn clip_segment(
    origin: (f64, f64),
    delta: (f64, f64),
    min: (f64, f64),
    max: (f64, f64),
) -> Option<(f64, f64)> {
    let (mut enter, mut exit) = (0.0f64, 1.0f64);
    let axes = [
        (origin.0, delta.0, min.0, max.0),
        (origin.1, delta.1, min.1, max.1),
    ];
    for (start, step, low, high) in axes {
        if step == 0.0 {
            if start < low || start > high {
                return None;
            }
            continue;
        }
        let (a, b) = ((low - start) / step, (high - start) / step);
        enter = enter.max(a.min(b));
        exit = exit.min(a.max(b));
    }
    (enter <= exit).then_some((enter, exit))
}

fn interpolate(from: &StrokeSample, to: &StrokeSample, t: f64) -> StrokeSample {
    let precise = |a: f32, b: f32| (f64::from(a) + (f64::from(b) - f64::from(a)) * t) as f32;
    let t = t as f32;
    let lerp = |a: f32, b: f32| a + (b - a) * t;
    StrokeSample {
        x: precise(from.x, to.x),
        y: precise(from.y, to.y),
        pressure: lerp(from.pressure, to.pressure),
        tilt_x_degrees: lerp(from.tilt_x_degrees, to.tilt_x_degrees),
        tilt_y_degrees: lerp(from.tilt_y_degrees, to.tilt_y_degrees),
        velocity_pixels_per_second: lerp(
            from.velocity_pixels_per_second,
            to.velocity_pixels_per_second,
        ),
        timestamp_micros: to.timestamp_micros,
        distance_from_previous: (to.x - from.x).hypot(to.y - from.y) * t,
    }
}
