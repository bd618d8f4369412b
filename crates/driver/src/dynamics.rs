use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::StrokeSample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    pub pressure_size: bool,
    pub pressure_opacity: bool,
    pub velocity: bool,
    pub tilt: bool,
    /// Lowest multiplier fast motion may thin the stroke to.
    pub velocity_floor: f32,
    pub velocity_reference: f32,
    pub size_variation: f32,
    pub opacity_variation: f32,
    pub flow_variation: f32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            pressure_size: true,
            pressure_opacity: false,
            velocity: false,
            tilt: false,
            velocity_floor: 0.3,
            velocity_reference: 2000.0,
            size_variation: 0.0,
            opacity_variation: 0.0,
            flow_variation: 0.0,
        }
    }
}

impl DynamicsConfig {
    /// Every multiplier held at 1.
    pub fn constant() -> Self {
        Self {
            pressure_size: false,
            pressure_opacity: false,
            velocity: false,
            tilt: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dynamics {
    pub size: f32,
    pub opacity: f32,
    pub flow: f32,
}

impl Dynamics {
    pub const IDENTITY: Self = Self {
        size: 1.0,
        opacity: 1.0,
        flow: 1.0,
    };
}

pub fn compute_dynamics<R>(sample: &StrokeSample, config: &DynamicsConfig, rng: &mut R) -> Dynamics
where
    R: Rng + ?Sized,
{
    let mut dynamics = Dynamics::IDENTITY;
    let pressure = sample.pressure.clamp(0.0, 1.0);

    if config.pressure_size {
        dynamics.size *= pressure;
    }
    if config.pressure_opacity {
        dynamics.opacity *= pressure;
    }
    if config.velocity && config.velocity_reference > 0.0 {
        let speed = sample.velocity_pixels_per_second.max(0.0);
        let thinning = (1.0 / (1.0 + speed / config.velocity_reference))
            .max(config.velocity_floor.clamp(0.0, 1.0));
        dynamics.size *= thinning;
        dynamics.flow *= thinning;
    }
    if config.tilt {
        let tilt = sample.tilt_x_degrees.hypot(sample.tilt_y_degrees).min(90.0) / 90.0;
        dynamics.size *= 1.0 + 0.5 * tilt;
    }

    dynamics.size *= jitter(rng, config.size_variation);
    dynamics.opacity *= jitter(rng, config.opacity_variation);
    dynamics.flow *= jitter(rng, config.flow_variation);

    Dynamics {
        size: dynamics.size.max(0.0),
        opacity: dynamics.opacity.clamp(0.0, 1.0),
        flow: dynamics.flow.clamp(0.0, 1.0),
    }
}

fn jitter<R>(rng: &mut R, variation: f32) -> f32
where
    R: Rng + ?Sized,
{
    let variation = variation.clamp(0.0, 1.0);
    if variation == 0.0 {
        return 1.0;
    }
    1.0 + variation * rng.random_range(-1.0f32..=1.0)
}
