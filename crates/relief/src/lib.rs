//! Displacement and normal maps derived from height-contributing layers.
//!
//! Each source adds its painted alpha weighted by `min(height * gain, cap)`.
//! The sum is blurred, normalized into `[0, 1]` and handed out together with
//! the displacement scale it was normalized by, so the surface can recover
//! absolute relief as `field * displacement_scale`. Maps are always rebuilt
//! from scratch; blurring couples neighbouring contributions, so there is no
//! sound incremental update.

use effects::{alpha_plane, box_blur_plane};
use log::debug;
use model::{RasterBuffer, RasterError, Rgba8, ScalarField, unit_to_byte, zeroed_plane};
use render_protocol::{HeightSource, LayerId, MAX_DISPLACEMENT_SCALE, ReliefParameters};
use serde::{Deserialize, Serialize};

const BASE_ROUGHNESS: f32 = 0.8;
const MIN_ROUGHNESS: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReliefError {
    #[error("height source {layer_id:?} is {actual:?}, canvas is {expected:?}")]
    DimensionMismatch {
        layer_id: LayerId,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliefConfig {
    /// `k` in `min(height * k, cap)`.
    pub height_gain: f32,
    /// Per-layer weight bound; never above [`MAX_DISPLACEMENT_SCALE`].
    pub height_cap: f32,
    pub normal_intensity: f32,
    pub blur_radius: u32,
}

impl Default for ReliefConfig {
    fn default() -> Self {
        Self {
            height_gain: 0.05,
            height_cap: MAX_DISPLACEMENT_SCALE,
            normal_intensity: 0.5,
            blur_radius: 2,
        }
    }
}

impl ReliefConfig {
    fn sanitized(mut self) -> Self {
        if !self.height_gain.is_finite() || self.height_gain < 0.0 {
            self.height_gain = 0.0;
        }
        if !self.height_cap.is_finite() {
            self.height_cap = MAX_DISPLACEMENT_SCALE;
        }
        self.height_cap = self.height_cap.clamp(0.0, MAX_DISPLACEMENT_SCALE);
        if !self.normal_intensity.is_finite() {
            self.normal_intensity = 0.0;
        }
        self.normal_intensity = self.normal_intensity.max(0.0);
        self
    }

    /// Weight one source contributes per unit of alpha.
    pub fn weight(&self, height: f32) -> f32 {
        if !height.is_finite() {
            return 0.0;
        }
        (height.max(0.0) * self.height_gain).min(self.height_cap)
    }
}

#[derive(Debug)]
pub struct ReliefMaps {
    /// Relief normalized into `[0, 1]`.
    pub displacement: ScalarField,
    /// Tangent-space normals packed as `rgb = n * 0.5 + 0.5`, opaque.
    pub normal_map: RasterBuffer,
    pub parameters: ReliefParameters,
}

#[derive(Debug, Default)]
pub struct ReliefBuilder {
    config: ReliefConfig,
}

impl ReliefBuilder {
    pub fn new(config: ReliefConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &ReliefConfig {
        &self.config
    }

    pub fn reconfigure(&mut self, config: ReliefConfig) {
        self.config = config.sanitized();
    }

    pub fn build(
        &self,
        width: u32,
        height: u32,
        sources: &[HeightSource<'_>],
    ) -> Result<ReliefMaps, ReliefError> {
        let expected = (width, height);
        for source in sources {
            if source.buffer.dimensions() != expected {
                return Err(ReliefError::DimensionMismatch {
                    layer_id: source.layer_id,
                    expected,
                    actual: source.buffer.dimensions(),
                });
            }
        }
        let (w, h) = (width as usize, height as usize);

        let mut accumulated = zeroed_plane(w * h)?;
        let mut weight_sum = 0.0;
        let mut curvature_sum = 0.0;
        for source in sources {
            let weight = self.config.weight(source.height);
            if weight <= 0.0 {
                continue;
            }
            for (value, alpha) in accumulated.iter_mut().zip(alpha_plane(source.buffer)?) {
                *value += alpha * weight;
            }
            weight_sum += weight;
            curvature_sum += source.curvature.clamp(0.0, 1.0) * weight;
        }

        let blurred = box_blur_plane(&accumulated, w, h, self.config.blur_radius)?;
        let peak = blurred.iter().copied().fold(0.0f32, f32::max);
        let mut displacement = ScalarField::zeroed(width, height)?;
        if peak > 0.0 {
            for (out, value) in displacement.values_mut().iter_mut().zip(&blurred) {
                *out = (value / peak).clamp(0.0, 1.0);
            }
        }
        let normal_map = normal_map(&displacement, self.config.normal_intensity)?;

        let mean_curvature = if weight_sum > 0.0 {
            curvature_sum / weight_sum
        } else {
            0.0
        };
        let parameters = ReliefParameters {
            displacement_scale: peak.min(MAX_DISPLACEMENT_SCALE),
            normal_scale: [self.config.normal_intensity; 2],
            roughness: (BASE_ROUGHNESS * (1.0 - 0.5 * mean_curvature)).clamp(MIN_ROUGHNESS, 1.0),
        };
        debug!(
            "relief from {} sources: scale {:.3} roughness {:.3}",
            sources.len(),
            parameters.displacement_scale,
            parameters.roughness
        );
        Ok(ReliefMaps {
            displacement,
            normal_map,
            parameters,
        })
    }
}

/// Sobel gradient of `field`, edge-clamped, packed as a normal map.
pub fn normal_map(field: &ScalarField, intensity: f32) -> Result<RasterBuffer, RasterError> {
    let (width, height) = (field.width(), field.height());
    let mut normals = RasterBuffer::new(width, height)?;
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let sample = |dx: i64, dy: i64| field.sample_clamped(x + dx, y + dy);
            let gx = (sample(1, -1) + 2.0 * sample(1, 0) + sample(1, 1))
                - (sample(-1, -1) + 2.0 * sample(-1, 0) + sample(-1, 1));
            let gy = (sample(-1, 1) + 2.0 * sample(0, 1) + sample(1, 1))
                - (sample(-1, -1) + 2.0 * sample(0, -1) + sample(1, -1));
            let (nx, ny, nz) = (-gx * intensity, -gy * intensity, 1.0f32);
            let length = (nx * nx + ny * ny + nz * nz).sqrt();
            let pack = |component: f32| unit_to_byte(component / length * 0.5 + 0.5);
            normals.set_pixel(x as u32, y as u32, Rgba8::opaque(pack(nx), pack(ny), pack(nz)));
        }
    }
    Ok(normals)
}
