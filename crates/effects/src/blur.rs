use model::{BYTES_PER_PIXEL, RasterBuffer, RasterError, byte_to_unit, zeroed_plane};

pub fn alpha_plane(buffer: &RasterBuffer) -> Result<Vec<f32>, RasterError> {
    let mut plane = zeroed_plane(buffer.as_bytes().len() / BYTES_PER_PIXEL)?;
    for (value, pixel) in plane.iter_mut().zip(buffer.as_bytes().chunks_exact(BYTES_PER_PIXEL)) {
        *value = byte_to_unit(pixel[3]);
    }
    Ok(plane)
}

/// Box blur with a `(2 * radius + 1)` square window. Samples outside the
/// plane count as zero, so content fades out towards the edges instead of
/// smearing. Runs as two sliding-window passes; the result equals the direct
/// per-pixel window average.
pub fn box_blur_plane(
    plane: &[f32],
    width: usize,
    height: usize,
    radius: u32,
) -> Result<Vec<f32>, RasterError> {
    assert_eq!(plane.len(), width * height, "plane size mismatch");
    if radius == 0 || plane.is_empty() {
        let mut copy = zeroed_plane(plane.len())?;
        copy.copy_from_slice(plane);
        return Ok(copy);
    }
    let radius = radius as usize;
    let window = (2 * radius + 1) as f32;

    let mut horizontal = zeroed_plane(plane.len())?;
    for y in 0..height {
        let row = &plane[y * width..(y + 1) * width];
        let out = &mut horizontal[y * width..(y + 1) * width];
        sliding_sum(row.len(), radius, |index| row[index], |index, sum| {
            out[index] = sum / window;
        });
    }

    let mut vertical = zeroed_plane(plane.len())?;
    for x in 0..width {
        sliding_sum(
            height,
            radius,
            |index| horizontal[index * width + x],
            |index, sum| vertical[index * width + x] = sum / window,
        );
    }
    Ok(vertical)
}

fn sliding_sum(
    len: usize,
    radius: usize,
    sample: impl Fn(usize) -> f32,
    mut write: impl FnMut(usize, f32),
) {
    let mut sum: f32 = (0..=radius.min(len.saturating_sub(1))).map(&sample).sum();
    for index in 0..len {
        write(index, sum);
        let entering = index + radius + 1;
        if entering < len {
            sum += sample(entering);
        }
        if index >= radius {
            sum -= sample(index - radius);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_box_blur(plane: &[f32], width: usize, height: usize, radius: i64) -> Vec<f32> {
        let window = ((2 * radius + 1) * (2 * radius + 1)) as f32;
        let mut out = vec![0.0; plane.len()];
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let mut sum = 0.0;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let (sx, sy) = (x + dx, y + dy);
                        if sx >= 0 && sy >= 0 && sx < width as i64 && sy < height as i64 {
                            sum += plane[sy as usize * width + sx as usize];
                        }
                    }
                }
                out[y as usize * width + x as usize] = sum / window;
            }
        }
        out
    }

    #[test]
    fn separable_blur_matches_direct_window_average() {
        let width = 7;
        let height = 5;
        let plane: Vec<f32> = (0..width * height)
            .map(|index| ((index * 37) % 11) as f32 / 10.0)
            .collect();
        let fast = box_blur_plane(&plane, width, height, 2).expect("blur");
        let slow = naive_box_blur(&plane, width, height, 2);
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert!((a - b).abs() < 1e-4, "fast {a} slow {b}");
        }
    }

    #[test]
    fn zero_radius_is_identity() {
        let plane = vec![0.25, 0.5, 0.75, 1.0];
        assert_eq!(box_blur_plane(&plane, 2, 2, 0).expect("blur"), plane);
    }

    #[test]
    fn blur_spreads_a_single_pixel() {
        let mut plane = vec![0.0; 25];
        plane[12] = 1.0;
        let blurred = box_blur_plane(&plane, 5, 5, 1).expect("blur");
        assert!((blurred[12] - 1.0 / 9.0).abs() < 1e-6);
        assert!((blurred[6] - 1.0 / 9.0).abs() < 1e-6);
        assert_eq!(blurred[0], 0.0);
    }
}
