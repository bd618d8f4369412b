//! Tool dispatcher and engine facade.
//!
//! [`PaintEngine`] owns the document, the brush rasterizer, the compositor
//! and the relief builder. Tool requests arrive either whole, as
//! [`ToolOperation`]s, or as raw pointer events that the driver turns into
//! stroke events drained once per frame. Each request is routed to the layer
//! its tool paints into, creating a tool-owned layer on demand, and every
//! committed change is reported to the registered [`CommitObserver`]s.

mod config;
mod export;
mod fill;
mod operation;

use std::ops::Range;

use brush_execution::{
    BrushError, BrushRasterizer, BrushSettings, PaintMode, plan_stitches, render_stitches,
};
use document::{Document, DocumentError, PaintTarget};
use driver::{
    DEFAULT_EVENT_QUEUE_CAPACITY, DriverEngine, DriverEventError, FrameDispatchSignal,
    InputSamplingAlgorithm, PointerSample, RawPointerInput, SampleProcessingError,
    StabilizedSampling, StrokeContext, StrokeEvent, StrokeSample, StrokeSessionId,
};
use effects::{EffectError, PuffDab, stamp_puff_dab};
use log::{debug, info, warn};
use model::RasterBuffer;
use raster_pool::RasterPool;
use relief::{ReliefBuilder, ReliefError, ReliefMaps};
use render_protocol::{LayerId, SurfaceSink, SurfaceTexture, ToolTag};
use renderer::{CompositeReport, Compositor, RenderError};

pub use config::{EmbroideryConfig, EngineConfig, PuffConfig, RecomposePolicy};
pub use export::{ExportError, encode_field_png, encode_png};
pub use fill::flood_fill;
pub use operation::ToolOperation;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Brush(#[from] BrushError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Relief(#[from] ReliefError),
    #[error(transparent)]
    Effect(#[from] EffectError),
    #[error(transparent)]
    Driver(#[from] DriverEventError),
    #[error(transparent)]
    Sampling(#[from] SampleProcessingError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Reported after every committed tool operation and finished stroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub tool: ToolTag,
    pub layer_id: LayerId,
    /// Document revision right after the commit.
    pub revision: u64,
    pub dirty_rows: Option<Range<u32>>,
}

/// Hook for the external undo history.
pub trait CommitObserver {
    fn on_commit(&mut self, record: &CommitRecord);
}

impl<F> CommitObserver for F
where
    F: FnMut(&CommitRecord),
{
    fn on_commit(&mut self, record: &CommitRecord) {
        self(record)
    }
}

/// What one [`PaintEngine::dispatch_frame`] call processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_sequence_id: u64,
    pub event_count: usize,
    pub commits: Vec<CommitRecord>,
}

#[derive(Debug)]
struct LiveStroke {
    stroke_session_id: StrokeSessionId,
    tool: ToolTag,
    layer_id: LayerId,
    rows: Option<Range<u32>>,
}

pub struct PaintEngine {
    config: EngineConfig,
    document: Document,
    rasterizer: BrushRasterizer,
    compositor: Compositor,
    relief: ReliefBuilder,
    /// Maps and the height revision they were built from.
    relief_cache: Option<(u64, ReliefMaps)>,
    driver: DriverEngine<StabilizedSampling>,
    live_stroke: Option<LiveStroke>,
    frame_sequence_id: u64,
    observers: Vec<Box<dyn CommitObserver>>,
    sink: Option<Box<dyn SurfaceSink>>,
}

impl PaintEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let pool = RasterPool::with_max_free_entries(config.pool_watermark);
        let document = Document::with_pool(config.canvas_width, config.canvas_height, pool)?;
        let driver = DriverEngine::new(
            DEFAULT_EVENT_QUEUE_CAPACITY,
            StabilizedSampling::new,
            config.stabilizer,
        )?;
        info!(
            "engine ready: canvas {}x{}",
            config.canvas_width, config.canvas_height
        );
        Ok(Self {
            relief: ReliefBuilder::new(config.relief),
            config,
            document,
            rasterizer: BrushRasterizer::new(),
            compositor: Compositor::new(),
            relief_cache: None,
            driver,
            live_stroke: None,
            frame_sequence_id: 0,
            observers: Vec::new(),
            sink: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access for layer management. Pixel edits made through it must
    /// be reported with [`Document::mark_painted`].
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Applies a new configuration to the live engine. A different canvas
    /// size resizes the document; stabilizer changes take effect from the
    /// next stroke.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        if (config.canvas_width, config.canvas_height) != self.document.dimensions() {
            self.document.resize(config.canvas_width, config.canvas_height)?;
        }
        self.document.set_pool_watermark(config.pool_watermark);
        self.driver.set_config(config.stabilizer);
        self.relief.reconfigure(config.relief);
        self.relief_cache = None;
        self.config = config;
        info!("engine reconfigured");
        Ok(())
    }

    pub fn add_observer(&mut self, observer: impl CommitObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Surface pushed to after each commit under
    /// [`RecomposePolicy::EveryCommit`] and by [`PaintEngine::present_attached`].
    pub fn attach_sink(&mut self, sink: Box<dyn SurfaceSink>) -> Option<Box<dyn SurfaceSink>> {
        self.sink.replace(sink)
    }

    pub fn detach_sink(&mut self) -> Option<Box<dyn SurfaceSink>> {
        self.sink.take()
    }

    /// Routes one tool request to its layer and rasterizer and commits it.
    pub fn apply(&mut self, operation: &ToolOperation) -> Result<CommitRecord, EngineError> {
        let (tool, layer_id, rows) = match operation {
            ToolOperation::Brush { points, settings } => {
                let settings = settings.clone().unwrap_or_else(|| self.config.brush.clone());
                let (tool, layer_id) = match settings.mode {
                    PaintMode::Paint => (ToolTag::Brush, self.tool_layer(ToolTag::Brush)?),
                    PaintMode::Erase => {
                        (ToolTag::Erase, self.active_or_tool_layer(ToolTag::Erase)?)
                    }
                };
                let samples = self.sample_points(points)?;
                let rows = self.paint_stroke(layer_id, &settings, &samples)?;
                (tool, layer_id, rows)
            }
            ToolOperation::Puff {
                x,
                y,
                size,
                opacity,
                color,
                height,
                curvature,
            } => {
                let layer_id = self.tool_layer(ToolTag::Puff)?;
                let dab = PuffDab {
                    x: *x,
                    y: *y,
                    size: *size,
                    opacity: *opacity,
                    color: *color,
                };
                let style = self.config.puff.style;
                let PaintTarget { buffer, .. } = self.document.paint_target(layer_id)?;
                let rows = stamp_puff_dab(buffer, &dab, &style)?;
                self.ensure_relief(layer_id, *height, self.config.puff.default_height)?;
                if curvature.is_some() || self.document.layer(layer_id)?.curvature().is_none() {
                    let curvature = curvature.unwrap_or(self.config.puff.default_curvature);
                    self.document.set_curvature(layer_id, Some(curvature))?;
                }
                (ToolTag::Puff, layer_id, rows)
            }
            ToolOperation::Embroidery {
                stitch_type,
                thread,
                points,
            } => {
                let layer_id = self.tool_layer(ToolTag::Embroidery)?;
                let stitch_type = stitch_type.unwrap_or(self.config.embroidery.stitch_type);
                let thread = thread.unwrap_or(self.config.embroidery.thread);
                let needle_points = plan_stitches(points, stitch_type, &thread);
                debug!("{:?} embroidery: {} needle points", stitch_type, needle_points.len());
                let PaintTarget { buffer, .. } = self.document.paint_target(layer_id)?;
                let rows = render_stitches(buffer, &needle_points, &thread);
                self.ensure_relief(layer_id, None, self.config.embroidery.height)?;
                (ToolTag::Embroidery, layer_id, rows)
            }
            ToolOperation::Fill {
                x,
                y,
                color,
                tolerance,
            } => {
                let layer_id = self.active_or_tool_layer(ToolTag::Fill)?;
                let PaintTarget { buffer, .. } = self.document.paint_target(layer_id)?;
                (ToolTag::Fill, layer_id, flood_fill(buffer, *x, *y, *color, *tolerance))
            }
            ToolOperation::Erase { x, y, size } => {
                let layer_id = self.active_or_tool_layer(ToolTag::Erase)?;
                let settings = self.eraser(*size);
                let rows = self.paint_stroke(layer_id, &settings, &[StrokeSample::at(*x, *y)])?;
                (ToolTag::Erase, layer_id, rows)
            }
        };
        if let Some(rows) = rows.clone() {
            self.document.mark_painted(layer_id, rows)?;
        }
        self.commit(tool, layer_id, rows)
    }

    /// Feeds one raw pointer event to the driver. Stroke events are applied
    /// on the next [`PaintEngine::dispatch_frame`].
    pub fn handle_pointer_event(&mut self, input: RawPointerInput) -> Result<(), EngineError> {
        self.driver.handle_pointer_event(input)?;
        Ok(())
    }

    /// Drains the stroke events queued since the last frame and paints them
    /// with the configured brush.
    pub fn dispatch_frame(&mut self) -> Result<FrameReport, EngineError> {
        self.frame_sequence_id += 1;
        let events = self.driver.dispatch_frame(FrameDispatchSignal {
            frame_sequence_id: self.frame_sequence_id,
        });
        let mut report = FrameReport {
            frame_sequence_id: self.frame_sequence_id,
            event_count: events.len(),
            commits: Vec::new(),
        };
        for framed in events {
            match framed.event {
                StrokeEvent::Begin {
                    stroke_session_id, ..
                } => self.begin_live_stroke(stroke_session_id)?,
                StrokeEvent::Sample {
                    stroke_session_id,
                    sample,
                } => self.live_sample(stroke_session_id, sample)?,
                StrokeEvent::End { stroke_session_id } => {
                    if let Some(record) = self.end_live_stroke(stroke_session_id)? {
                        report.commits.push(record);
                    }
                }
                StrokeEvent::Cancel { stroke_session_id } => {
                    if self.live_stroke_matches(stroke_session_id) {
                        self.abort_stroke()?;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Discards the stroke in progress and restores the pixels it painted.
    /// Returns whether there was one.
    pub fn abort_stroke(&mut self) -> Result<bool, EngineError> {
        let Some(stroke) = self.live_stroke.take() else {
            return Ok(false);
        };
        let PaintTarget { buffer, pool } = self.document.paint_target(stroke.layer_id)?;
        let summary = self.rasterizer.abort_stroke(buffer, pool)?;
        debug!("aborted stroke {:?} after {} points", summary.stroke_id, summary.point_count);
        if let Some(rows) = stroke.rows {
            self.document.mark_painted(stroke.layer_id, rows)?;
        }
        Ok(true)
    }

    pub fn is_stroke_active(&self) -> bool {
        self.live_stroke.is_some()
    }

    /// Current composite, recomposing whatever changed since the last call.
    pub fn compose(&mut self) -> Result<&RasterBuffer, EngineError> {
        let dirty = self.document.take_dirty_rows();
        let output = self.compositor.compose(&self.document.render_tree(), &dirty)?;
        Ok(output)
    }

    pub fn last_composite_report(&self) -> CompositeReport {
        self.compositor.last_report()
    }

    /// Relief maps for the current height layers, rebuilt only when a
    /// height-affecting change happened since the last build.
    pub fn relief(&mut self) -> Result<&ReliefMaps, EngineError> {
        let height_revision = self.document.height_revision();
        let maps = match self.relief_cache.take() {
            Some((built_from, maps)) if built_from == height_revision => maps,
            _ => {
                let (width, height) = self.document.dimensions();
                self.relief.build(width, height, &self.document.height_sources())?
            }
        };
        Ok(&self.relief_cache.insert((height_revision, maps)).1)
    }

    /// Pushes the composite and the relief maps to `sink`.
    pub fn present(&mut self, sink: &mut dyn SurfaceSink) -> Result<(), EngineError> {
        let revision = self.document.revision();
        let output = self.compose()?;
        sink.apply_texture(SurfaceTexture {
            width: output.width(),
            height: output.height(),
            pixels: output.as_bytes(),
            revision,
        });
        let maps = self.relief()?;
        sink.apply_relief(&maps.displacement, &maps.normal_map, maps.parameters);
        Ok(())
    }

    pub fn present_attached(&mut self) -> Result<(), EngineError> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };
        let result = self.present(sink.as_mut());
        self.sink = Some(sink);
        result
    }

    pub fn export_composite_png(&mut self) -> Result<Vec<u8>, EngineError> {
        Ok(encode_png(self.compose()?)?)
    }

    pub fn export_layer_png(&self, layer_id: LayerId) -> Result<Vec<u8>, EngineError> {
        let layer = self.document.layer(layer_id)?;
        let buffer = layer.buffer().ok_or(DocumentError::NotPaintable {
            layer_id,
            kind: layer.kind(),
        })?;
        Ok(encode_png(buffer)?)
    }

    pub fn export_normal_map_png(&mut self) -> Result<Vec<u8>, EngineError> {
        Ok(encode_png(&self.relief()?.normal_map)?)
    }

    pub fn export_displacement_png(&mut self) -> Result<Vec<u8>, EngineError> {
        Ok(encode_field_png(&self.relief()?.displacement)?)
    }

    /// Topmost layer owned by `tool`, created when there is none.
    fn tool_layer(&mut self, tool: ToolTag) -> Result<LayerId, EngineError> {
        match self.document.find_tool_layer(tool) {
            Some(layer_id) => Ok(layer_id),
            None => Ok(self.document.create_tool_layer(tool)?),
        }
    }

    /// The active layer when pixel tools may paint it, else the tool's layer.
    fn active_or_tool_layer(&mut self, tool: ToolTag) -> Result<LayerId, EngineError> {
        let usable = self.document.active_layer().filter(|layer_id| {
            self.document
                .layer(*layer_id)
                .is_ok_and(|layer| layer.kind().is_paintable() && !layer.is_locked())
        });
        match usable {
            Some(layer_id) => Ok(layer_id),
            None => self.tool_layer(tool),
        }
    }

    /// Sets the layer's relief height from `requested`, or to `fallback`
    /// when the layer has none yet.
    fn ensure_relief(
        &mut self,
        layer_id: LayerId,
        requested: Option<f32>,
        fallback: f32,
    ) -> Result<(), EngineError> {
        if requested.is_some() || self.document.layer(layer_id)?.height().is_none() {
            self.document.set_height(layer_id, Some(requested.unwrap_or(fallback)))?;
        }
        Ok(())
    }

    fn eraser(&self, size: f32) -> BrushSettings {
        BrushSettings {
            size,
            opacity: 1.0,
            flow: 1.0,
            mode: PaintMode::Erase,
            texture: None,
            dynamics: driver::DynamicsConfig::constant(),
            ..self.config.brush.clone()
        }
    }

    /// Runs whole-stroke points through the same normalization and
    /// stabilization as live input.
    fn sample_points(&self, points: &[PointerSample]) -> Result<Vec<StrokeSample>, EngineError> {
        let mut sampling = StabilizedSampling::new();
        let context = StrokeContext {
            stroke_session_id: 0,
            pointer_id: 0,
        };
        let mut samples = Vec::with_capacity(points.len() + 1);
        sampling.begin_stroke(context, &self.config.stabilizer)?;
        for point in points {
            sampling.feed_input(*point, &mut samples)?;
        }
        sampling.end_stroke(&mut samples)?;
        Ok(samples)
    }

    fn paint_stroke(
        &mut self,
        layer_id: LayerId,
        settings: &BrushSettings,
        samples: &[StrokeSample],
    ) -> Result<Option<Range<u32>>, EngineError> {
        let PaintTarget { buffer, pool } = self.document.paint_target(layer_id)?;
        self.rasterizer.start_stroke(settings, buffer, pool)?;
        let mut rows = None;
        for sample in samples {
            match self.rasterizer.add_point(*sample, buffer) {
                Ok(progress) => rows = union_rows(rows, progress.dirty_rows),
                Err(error) => {
                    self.rasterizer.abort_stroke(buffer, pool)?;
                    return Err(error.into());
                }
            }
        }
        if let Some(summary) = self.rasterizer.end_stroke(pool) {
            debug!("stroke {:?}: {} stamps", summary.stroke_id, summary.stamp_count);
        }
        Ok(rows)
    }

    fn live_stroke_matches(&self, stroke_session_id: StrokeSessionId) -> bool {
        self.live_stroke
            .as_ref()
            .is_some_and(|stroke| stroke.stroke_session_id == stroke_session_id)
    }

    fn begin_live_stroke(&mut self, stroke_session_id: StrokeSessionId) -> Result<(), EngineError> {
        if self.abort_stroke()? {
            warn!("stroke {} began while another was unfinished", stroke_session_id);
        }
        let settings = self.config.brush.clone();
        let (tool, layer_id) = match settings.mode {
            PaintMode::Paint => (ToolTag::Brush, self.tool_layer(ToolTag::Brush)?),
            PaintMode::Erase => (ToolTag::Erase, self.active_or_tool_layer(ToolTag::Erase)?),
        };
        let PaintTarget { buffer, pool } = self.document.paint_target(layer_id)?;
        self.rasterizer.start_stroke(&settings, buffer, pool)?;
        self.live_stroke = Some(LiveStroke {
            stroke_session_id,
            tool,
            layer_id,
            rows: None,
        });
        Ok(())
    }

    fn live_sample(
        &mut self,
        stroke_session_id: StrokeSessionId,
        sample: StrokeSample,
    ) -> Result<(), EngineError> {
        let Some(stroke) = self
            .live_stroke
            .as_ref()
            .filter(|stroke| stroke.stroke_session_id == stroke_session_id)
        else {
            return Ok(());
        };
        let layer_id = stroke.layer_id;
        let PaintTarget { buffer, .. } = self.document.paint_target(layer_id)?;
        let progress = match self.rasterizer.add_point(sample, buffer) {
            Ok(progress) => progress,
            Err(error) => {
                self.abort_stroke()?;
                return Err(error.into());
            }
        };
        if let Some(rows) = progress.dirty_rows {
            self.document.mark_painted(layer_id, rows.clone())?;
            if let Some(stroke) = self.live_stroke.as_mut() {
                stroke.rows = union_rows(stroke.rows.take(), Some(rows));
            }
        }
        Ok(())
    }

    fn end_live_stroke(
        &mut self,
        stroke_session_id: StrokeSessionId,
    ) -> Result<Option<CommitRecord>, EngineError> {
        if !self.live_stroke_matches(stroke_session_id) {
            return Ok(None);
        }
        let Some(stroke) = self.live_stroke.take() else {
            return Ok(None);
        };
        let PaintTarget { pool, .. } = self.document.paint_target(stroke.layer_id)?;
        if let Some(summary) = self.rasterizer.end_stroke(pool) {
            debug!("stroke {:?} ended: {} stamps", summary.stroke_id, summary.stamp_count);
        }
        self.commit(stroke.tool, stroke.layer_id, stroke.rows).map(Some)
    }

    fn commit(
        &mut self,
        tool: ToolTag,
        layer_id: LayerId,
        dirty_rows: Option<Range<u32>>,
    ) -> Result<CommitRecord, EngineError> {
        let record = CommitRecord {
            tool,
            layer_id,
            revision: self.document.revision(),
            dirty_rows,
        };
        for observer in &mut self.observers {
            observer.on_commit(&record);
        }
        if self.config.recompose == RecomposePolicy::EveryCommit {
            self.present_attached()?;
        }
        Ok(record)
    }
}

fn union_rows(current: Option<Range<u32>>, added: Option<Range<u32>>) -> Option<Range<u32>> {
    match (current, added) {
        (Some(current), Some(added)) => {
            Some(current.start.min(added.start)..current.end.max(added.end))
        }
        (current, added) => current.or(added),
    }
}
