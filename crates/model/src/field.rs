use crate::RasterError;

/// Zero-filled scalar plane of `len` samples. Fails instead of aborting when
/// the allocation cannot be satisfied.
pub fn zeroed_plane(len: usize) -> Result<Vec<f32>, RasterError> {
    let bytes = len.saturating_mul(size_of::<f32>());
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| RasterError::OutOfMemory { bytes })?;
    values.resize(len, 0.0);
    Ok(values)
}

/// Dense row-major grid of scalars, used for height and displacement data.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl ScalarField {
    pub fn zeroed(width: u32, height: u32) -> Result<Self, RasterError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or(RasterError::InvalidDimensions { width, height })?;
        Ok(Self {
            width,
            height,
            values: zeroed_plane(len)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Edge-clamped sample.
    pub fn sample_clamped(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(x, y)
    }

    pub fn max_value(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsatisfiable_plane_is_an_error() {
        assert!(matches!(zeroed_plane(usize::MAX), Err(RasterError::OutOfMemory { .. })));
        assert_eq!(zeroed_plane(3).expect("plane"), vec![0.0; 3]);
    }

    #[test]
    fn zeroed_field_matches_dimensions() {
        let field = ScalarField::zeroed(3, 2).expect("field");
        assert_eq!(field.values().len(), 6);
        assert_eq!(field.max_value(), 0.0);
    }
}
