//! Pointer input to stroke samples.
//!
//! Raw pointer events are normalized (missing pressure/tilt defaulted,
//! velocity derived), stabilized, and queued as ordered [`StrokeEvent`]s that
//! the engine drains once per frame.

pub mod dynamics;
pub mod normalize;
pub mod stabilized_sampling;
pub mod stabilizer;

pub use dynamics::{Dynamics, DynamicsConfig, compute_dynamics};
pub use normalize::PointerNormalizer;
pub use stabilized_sampling::StabilizedSampling;
pub use stabilizer::{Stabilizer, StabilizerConfig, stabilize_point};

use serde::{Deserialize, Serialize};

pub type StrokeSessionId = u64;
pub type EventTimestampMicros = u64;
pub type FrameSequenceId = u64;

pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDeviceKind {
    Mouse,
    Pen,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventPhase {
    Hover,
    Down,
    Move,
    Up,
    Cancel,
}

/// Device-independent pointer sample. Devices without pressure or tilt
/// leave those fields empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub pressure: Option<f32>,
    #[serde(default)]
    pub tilt_x_degrees: Option<f32>,
    #[serde(default)]
    pub tilt_y_degrees: Option<f32>,
    #[serde(default)]
    pub timestamp_micros: EventTimestampMicros,
}

impl PointerSample {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPointerInput {
    pub pointer_id: u64,
    pub device_kind: PointerDeviceKind,
    pub phase: PointerEventPhase,
    pub sample: PointerSample,
}

/// Normalized point of a stroke in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeSample {
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub tilt_x_degrees: f32,
    pub tilt_y_degrees: f32,
    pub velocity_pixels_per_second: f32,
    pub timestamp_micros: EventTimestampMicros,
    pub distance_from_previous: f32,
}

impl StrokeSample {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

impl Default for StrokeSample {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            pressure: 1.0,
            tilt_x_degrees: 0.0,
            tilt_y_degrees: 0.0,
            velocity_pixels_per_second: 0.0,
            timestamp_micros: 0,
            distance_from_previous: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeContext {
    pub stroke_session_id: StrokeSessionId,
    pub pointer_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SampleProcessingError {
    #[error("pointer sample has non-finite coordinates")]
    InvalidInput,
    #[error("pointer timestamp went backwards within a stroke")]
    NonMonotonicTimestamp,
    #[error("sample fed outside of a stroke")]
    NoActiveStroke,
    #[error("stroke event queue is full")]
    QueueFull,
}

pub trait SampleEmitter {
    fn emit_sample(&mut self, sample: StrokeSample) -> Result<(), SampleProcessingError>;
}

impl SampleEmitter for Vec<StrokeSample> {
    fn emit_sample(&mut self, sample: StrokeSample) -> Result<(), SampleProcessingError> {
        self.push(sample);
        Ok(())
    }
}

/// Turns the raw samples of one stroke into emitted stroke samples.
pub trait InputSamplingAlgorithm {
    type Config;

    fn begin_stroke(
        &mut self,
        context: StrokeContext,
        config: &Self::Config,
    ) -> Result<(), SampleProcessingError>;

    fn feed_input<E>(
        &mut self,
        sample: PointerSample,
        emitter: &mut E,
    ) -> Result<(), SampleProcessingError>
    where
        E: SampleEmitter;

    fn end_stroke<E>(&mut self, emitter: &mut E) -> Result<(), SampleProcessingError>
    where
        E: SampleEmitter;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeEvent {
    Begin {
        stroke_session_id: StrokeSessionId,
        pointer_id: u64,
    },
    Sample {
        stroke_session_id: StrokeSessionId,
        sample: StrokeSample,
    },
    End {
        stroke_session_id: StrokeSessionId,
    },
    Cancel {
        stroke_session_id: StrokeSessionId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDispatchSignal {
    pub frame_sequence_id: FrameSequenceId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramedStrokeEvent {
    pub frame_sequence_id: FrameSequenceId,
    pub event: StrokeEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StrokeEventQueueCreateError {
    #[error("stroke event queue capacity must be positive")]
    ZeroCapacity,
}

/// Single-producer single-consumer ring of stroke events.
#[derive(Debug)]
pub struct StrokeEventQueue {
    producer: rtrb::Producer<StrokeEvent>,
    consumer: rtrb::Consumer<StrokeEvent>,
}

impl StrokeEventQueue {
    pub fn new(capacity: usize) -> Result<Self, StrokeEventQueueCreateError> {
        if capacity == 0 {
            return Err(StrokeEventQueueCreateError::ZeroCapacity);
        }
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        Ok(Self { producer, consumer })
    }

    pub fn push(&mut self, event: StrokeEvent) -> Result<(), SampleProcessingError> {
        self.producer
            .push(event)
            .map_err(|_| SampleProcessingError::QueueFull)
    }

    pub fn pop(&mut self) -> Option<StrokeEvent> {
        self.consumer.pop().ok()
    }

    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

struct QueueEmitter<'a> {
    stroke_session_id: StrokeSessionId,
    queue: &'a mut StrokeEventQueue,
}

impl SampleEmitter for QueueEmitter<'_> {
    fn emit_sample(&mut self, sample: StrokeSample) -> Result<(), SampleProcessingError> {
        self.queue.push(StrokeEvent::Sample {
            stroke_session_id: self.stroke_session_id,
            sample,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DriverEventError {
    #[error("a stroke is already active")]
    StrokeAlreadyActive,
    #[error("no stroke is active")]
    NoActiveStroke,
    #[error("pointer id does not match the active stroke")]
    PointerIdMismatch,
    #[error(transparent)]
    QueueCreate(#[from] StrokeEventQueueCreateError),
    #[error(transparent)]
    Sampling(#[from] SampleProcessingError),
}

struct ActiveStroke<A> {
    context: StrokeContext,
    algorithm: A,
}

/// Pointer phase state machine feeding the stroke event queue.
pub struct DriverEngine<A>
where
    A: InputSamplingAlgorithm,
    A::Config: Clone,
{
    queue: StrokeEventQueue,
    active_stroke: Option<ActiveStroke<A>>,
    next_stroke_session_id: StrokeSessionId,
    algorithm_factory: Box<dyn Fn() -> A>,
    algorithm_config: A::Config,
}

impl<A> DriverEngine<A>
where
    A: InputSamplingAlgorithm,
    A::Config: Clone,
{
    pub fn new(
        queue_capacity: usize,
        algorithm_factory: impl Fn() -> A + 'static,
        algorithm_config: A::Config,
    ) -> Result<Self, DriverEventError> {
        Ok(Self {
            queue: StrokeEventQueue::new(queue_capacity)?,
            active_stroke: None,
            next_stroke_session_id: 1,
            algorithm_factory: Box::new(algorithm_factory),
            algorithm_config,
        })
    }

    pub fn config(&self) -> &A::Config {
        &self.algorithm_config
    }

    /// Takes effect from the next stroke; an active stroke keeps the
    /// configuration it started with.
    pub fn set_config(&mut self, config: A::Config) {
        self.algorithm_config = config;
    }

    pub fn active_stroke(&self) -> Option<StrokeContext> {
        self.active_stroke.as_ref().map(|stroke| stroke.context)
    }

    pub fn handle_pointer_event(&mut self, input: RawPointerInput) -> Result<(), DriverEventError> {
        match input.phase {
            PointerEventPhase::Down => self.handle_pointer_down(input),
            PointerEventPhase::Move => self.handle_pointer_move(input),
            PointerEventPhase::Up => self.handle_pointer_up(input),
            PointerEventPhase::Cancel => self.handle_pointer_cancel(input),
            PointerEventPhase::Hover => Ok(()),
        }
    }

    pub fn dispatch_frame(&mut self, signal: FrameDispatchSignal) -> Vec<FramedStrokeEvent> {
        let mut output = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.queue.pop() {
            output.push(FramedStrokeEvent {
                frame_sequence_id: signal.frame_sequence_id,
                event,
            });
        }
        output
    }

    fn handle_pointer_down(&mut self, input: RawPointerInput) -> Result<(), DriverEventError> {
        if self.active_stroke.is_some() {
            return Err(DriverEventError::StrokeAlreadyActive);
        }

        let context = StrokeContext {
            stroke_session_id: self.next_stroke_session_id,
            pointer_id: input.pointer_id,
        };
        let mut algorithm = (self.algorithm_factory)();
        algorithm.begin_stroke(context, &self.algorithm_config)?;
        // A rejected first sample must not leave a half-open stroke behind.
        let mut first_samples = Vec::new();
        algorithm.feed_input(input.sample, &mut first_samples)?;

        self.queue.push(StrokeEvent::Begin {
            stroke_session_id: context.stroke_session_id,
            pointer_id: context.pointer_id,
        })?;
        for sample in first_samples {
            self.queue.push(StrokeEvent::Sample {
                stroke_session_id: context.stroke_session_id,
                sample,
            })?;
        }
        self.next_stroke_session_id = self
            .next_stroke_session_id
            .checked_add(1)
            .expect("stroke session id overflow");
        self.active_stroke = Some(ActiveStroke { context, algorithm });
        Ok(())
    }

    fn handle_pointer_move(&mut self, input: RawPointerInput) -> Result<(), DriverEventError> {
        let stroke = self
            .active_stroke
            .as_mut()
            .ok_or(DriverEventError::NoActiveStroke)?;
        if stroke.context.pointer_id != input.pointer_id {
            return Err(DriverEventError::PointerIdMismatch);
        }
        Self::feed(stroke, input.sample, &mut self.queue)
    }

    fn handle_pointer_up(&mut self, input: RawPointerInput) -> Result<(), DriverEventError> {
        let mut stroke = self.take_matching_stroke(input.pointer_id)?;
        Self::feed(&mut stroke, input.sample, &mut self.queue)?;
        let stroke_session_id = stroke.context.stroke_session_id;
        let mut emitter = QueueEmitter {
            stroke_session_id,
            queue: &mut self.queue,
        };
        stroke.algorithm.end_stroke(&mut emitter)?;
        self.queue.push(StrokeEvent::End { stroke_session_id })?;
        Ok(())
    }

    fn handle_pointer_cancel(&mut self, input: RawPointerInput) -> Result<(), DriverEventError> {
        let stroke = self.take_matching_stroke(input.pointer_id)?;
        self.queue.push(StrokeEvent::Cancel {
            stroke_session_id: stroke.context.stroke_session_id,
        })?;
        Ok(())
    }

    fn take_matching_stroke(
        &mut self,
        pointer_id: u64,
    ) -> Result<ActiveStroke<A>, DriverEventError> {
        let stroke = self
            .active_stroke
            .take()
            .ok_or(DriverEventError::NoActiveStroke)?;
        if stroke.context.pointer_id != pointer_id {
            self.active_stroke = Some(stroke);
            return Err(DriverEventError::PointerIdMismatch);
        }
        Ok(stroke)
    }

    fn feed(
        stroke: &mut ActiveStroke<A>,
        sample: PointerSample,
        queue: &mut StrokeEventQueue,
    ) -> Result<(), DriverEventError> {
        let mut emitter = QueueEmitter {
            stroke_session_id: stroke.context.stroke_session_id,
            queue,
        };
        stroke.algorithm.feed_input(sample, &mut emitter)?;
        Ok(())
    }
}
