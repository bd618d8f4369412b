use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::StrokeSample;

/// Weight decay per sample of age at `quality == 0`.
const MAX_SHARPNESS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub enabled: bool,
    /// Window length in samples, the raw point included.
    pub delay_samples: usize,
    /// 0 favours the newest sample, 1 averages the window evenly.
    pub quality: f32,
    pub adaptive: bool,
    /// Speed at which the adaptive window shrinks to half its length.
    pub adaptive_velocity_reference: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_samples: 6,
            quality: 0.5,
            adaptive: true,
            adaptive_velocity_reference: 1500.0,
        }
    }
}

impl StabilizerConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn effective_delay(&self, velocity_pixels_per_second: f32) -> usize {
        let delay = self.delay_samples.max(1);
        if !self.adaptive || self.adaptive_velocity_reference <= 0.0 {
            return delay;
        }
        let speed = velocity_pixels_per_second.max(0.0);
        let scaled = delay as f32 / (1.0 + speed / self.adaptive_velocity_reference);
        (scaled.round() as usize).max(1)
    }
}

/// Weighted average of `raw` and the tail of `history` (oldest first, `raw`
/// not included). Only the position is smoothed; pressure, tilt and timing
/// stay those of `raw`.
pub fn stabilize_point(
    raw: &StrokeSample,
    history: &[StrokeSample],
    config: &StabilizerConfig,
) -> StrokeSample {
    if !config.enabled {
        return *raw;
    }
    let window = config.effective_delay(raw.velocity_pixels_per_second);
    let older = (window - 1).min(history.len());
    if older == 0 {
        return *raw;
    }

    let sharpness = MAX_SHARPNESS * (1.0 - config.quality.clamp(0.0, 1.0));
    let mut total_weight = 1.0;
    let mut x = raw.x;
    let mut y = raw.y;
    for (age, sample) in history.iter().rev().take(older).enumerate() {
        let weight = (-((age + 1) as f32) * sharpness).exp();
        total_weight += weight;
        x += sample.x * weight;
        y += sample.y * weight;
    }

    StrokeSample {
        x: x / total_weight,
        y: y / total_weight,
        ..*raw
    }
}

/// Rolling-window wrapper around [`stabilize_point`].
#[derive(Debug, Clone)]
pub struct Stabilizer {
    config: StabilizerConfig,
    history: VecDeque<StrokeSample>,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(config.delay_samples.max(1)),
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn reconfigure(&mut self, config: StabilizerConfig) {
        self.config = config;
        self.trim_history();
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn push(&mut self, raw: StrokeSample) -> StrokeSample {
        let stabilized = stabilize_point(&raw, self.history.make_contiguous(), &self.config);
        self.history.push_back(raw);
        self.trim_history();
        stabilized
    }

    fn trim_history(&mut self) {
        let keep = self.config.delay_samples.max(1);
        while self.history.len() > keep {
            self.history.pop_front();
        }
    }
}
