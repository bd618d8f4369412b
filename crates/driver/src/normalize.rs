use crate::{PointerSample, SampleProcessingError, StrokeSample};

const MAX_TILT_DEGREES: f32 = 90.0;

/// Fills in device gaps and derives per-sample motion for one stroke.
#[derive(Debug, Default, Clone)]
pub struct PointerNormalizer {
    previous: Option<StrokeSample>,
}

impl PointerNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&StrokeSample> {
        self.previous.as_ref()
    }

    pub fn normalize(
        &mut self,
        input: PointerSample,
    ) -> Result<StrokeSample, SampleProcessingError> {
        if !input.x.is_finite() || !input.y.is_finite() {
            return Err(SampleProcessingError::InvalidInput);
        }

        let (distance_from_previous, velocity_pixels_per_second) = match self.previous {
            Some(previous) => {
                if input.timestamp_micros < previous.timestamp_micros {
                    return Err(SampleProcessingError::NonMonotonicTimestamp);
                }
                let distance = (input.x - previous.x).hypot(input.y - previous.y);
                let delta_micros = input.timestamp_micros - previous.timestamp_micros;
                let velocity = if delta_micros == 0 {
                    previous.velocity_pixels_per_second
                } else {
                    distance / (delta_micros as f32 / 1_000_000.0)
                };
                (distance, velocity)
            }
            None => (0.0, 0.0),
        };

        let sample = StrokeSample {
            x: input.x,
            y: input.y,
            pressure: finite_or(input.pressure, 1.0).clamp(0.0, 1.0),
            tilt_x_degrees: finite_or(input.tilt_x_degrees, 0.0)
                .clamp(-MAX_TILT_DEGREES, MAX_TILT_DEGREES),
            tilt_y_degrees: finite_or(input.tilt_y_degrees, 0.0)
                .clamp(-MAX_TILT_DEGREES, MAX_TILT_DEGREES),
            velocity_pixels_per_second,
            timestamp_micros: input.timestamp_micros,
            distance_from_previous,
        };
        self.previous = Some(sample);
        Ok(sample)
    }
}

fn finite_or(value: Option<f32>, fallback: f32) -> f32 {
    value.filter(|value| value.is_finite()).unwrap_or(fallback)
}
