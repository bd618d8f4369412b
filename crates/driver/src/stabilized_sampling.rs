use crate::{
    InputSamplingAlgorithm, PointerNormalizer, PointerSample, SampleEmitter, SampleProcessingError,
    Stabilizer, StabilizerConfig, StrokeContext, StrokeSample,
};

/// Normalizes every raw sample and emits its stabilized position. On stroke
/// end the last raw position is emitted once more if smoothing left the
/// stroke short of it.
#[derive(Debug, Clone)]
pub struct StabilizedSampling {
    stroke_context: Option<StrokeContext>,
    normalizer: PointerNormalizer,
    stabilizer: Stabilizer,
    last_emitted: Option<StrokeSample>,
}

impl Default for StabilizedSampling {
    fn default() -> Self {
        Self::new()
    }
}

impl StabilizedSampling {
    pub fn new() -> Self {
        Self {
            stroke_context: None,
            normalizer: PointerNormalizer::new(),
            stabilizer: Stabilizer::new(StabilizerConfig::default()),
            last_emitted: None,
        }
    }

    fn emit<E>(
        &mut self,
        mut sample: StrokeSample,
        emitter: &mut E,
    ) -> Result<(), SampleProcessingError>
    where
        E: SampleEmitter,
    {
        sample.distance_from_previous = match self.last_emitted {
            Some(previous) => (sample.x - previous.x).hypot(sample.y - previous.y),
            None => 0.0,
        };
        emitter.emit_sample(sample)?;
        self.last_emitted = Some(sample);
        Ok(())
    }
}

impl InputSamplingAlgorithm for StabilizedSampling {
    type Config = StabilizerConfig;

    fn begin_stroke(
        &mut self,
        context: StrokeContext,
        config: &Self::Config,
    ) -> Result<(), SampleProcessingError> {
        self.stroke_context = Some(context);
        self.normalizer.reset();
        self.stabilizer.reconfigure(*config);
        self.stabilizer.reset();
        self.last_emitted = None;
        Ok(())
    }

    fn feed_input<E>(
        &mut self,
        sample: PointerSample,
        emitter: &mut E,
    ) -> Result<(), SampleProcessingError>
    where
        E: SampleEmitter,
    {
        if self.stroke_context.is_none() {
            return Err(SampleProcessingError::NoActiveStroke);
        }
        let normalized = self.normalizer.normalize(sample)?;
        let stabilized = self.stabilizer.push(normalized);
        self.emit(stabilized, emitter)
    }

    fn end_stroke<E>(&mut self, emitter: &mut E) -> Result<(), SampleProcessingError>
    where
        E: SampleEmitter,
    {
        if self.stroke_context.take().is_none() {
            return Err(SampleProcessingError::NoActiveStroke);
        }
        let (Some(raw), Some(emitted)) = (self.normalizer.previous().copied(), self.last_emitted)
        else {
            return Ok(());
        };
        if raw.x != emitted.x || raw.y != emitted.y {
            self.emit(raw, emitter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> StrokeContext {
        StrokeContext {
            stroke_session_id: 1,
            pointer_id: 1,
        }
    }

    #[test]
    fn feed_before_begin_is_rejected() {
        let mut sampling = StabilizedSampling::new();
        let mut out = Vec::new();
        assert_eq!(
            sampling.feed_input(PointerSample::at(0.0, 0.0), &mut out),
            Err(SampleProcessingError::NoActiveStroke)
        );
    }

    #[test]
    fn end_stroke_catches_up_to_last_raw_point() {
        let mut sampling = StabilizedSampling::new();
        let config = StabilizerConfig {
            delay_samples: 4,
            adaptive: false,
            quality: 0.8,
            ..StabilizerConfig::default()
        };
        sampling.begin_stroke(context(), &config).expect("begin");
        let mut out = Vec::new();
        for index in 0..5u64 {
            sampling
                .feed_input(
                    PointerSample {
                        timestamp_micros: index * 1000,
                        ..PointerSample::at(index as f32 * 10.0, 0.0)
                    },
                    &mut out,
                )
                .expect("feed");
        }
        assert_eq!(out.len(), 5);
        assert!(out[4].x < 40.0);
        sampling.end_stroke(&mut out).expect("end");
        assert_eq!(out.len(), 6);
        assert_eq!(out[5].x, 40.0);
        assert!(out[5].distance_from_previous > 0.0);
    }

    #[test]
    fn disabled_stabilizer_passes_points_through() {
        let mut sampling = StabilizedSampling::new();
        sampling
            .begin_stroke(context(), &StabilizerConfig::disabled())
            .expect("begin");
        let mut out = Vec::new();
        sampling
            .feed_input(PointerSample::at(1.0, 2.0), &mut out)
            .expect("feed");
        sampling
            .feed_input(PointerSample::at(4.0, 6.0), &mut out)
            .expect("feed");
        sampling.end_stroke(&mut out).expect("end");
        assert_eq!(out.len(), 2);
        assert_eq!((out[1].x, out[1].y), (4.0, 6.0));
        assert_eq!(out[1].distance_from_previous, 5.0);
    }
}
