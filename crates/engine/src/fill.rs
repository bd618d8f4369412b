use std::ops::Range;

use bitvec::vec::BitVec;
use model::{RasterBuffer, Rgba8};

fn within(pixel: Rgba8, seed: Rgba8, limit: u8) -> bool {
    pixel.r.abs_diff(seed.r) <= limit
        && pixel.g.abs_diff(seed.g) <= limit
        && pixel.b.abs_diff(seed.b) <= limit
        && pixel.a.abs_diff(seed.a) <= limit
}

/// Scanline flood fill from `(x, y)` over the 4-connected region whose
/// pixels differ from the seed pixel by at most `tolerance` (a fraction of
/// the channel range) in every channel. Filled pixels are replaced by
/// `color`. Returns the rows that changed; a seed outside the buffer fills
/// nothing.
pub fn flood_fill(
    target: &mut RasterBuffer,
    x: f32,
    y: f32,
    color: Rgba8,
    tolerance: f32,
) -> Option<Range<u32>> {
    let (width, height) = target.dimensions();
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    let (seed_x, seed_y) = (x.floor() as u32, y.floor() as u32);
    if seed_x >= width || seed_y >= height {
        return None;
    }
    let seed = target.pixel(seed_x, seed_y);
    let tolerance = if tolerance.is_finite() { tolerance.clamp(0.0, 1.0) } else { 0.0 };
    let limit = (tolerance * 255.0).round() as u8;

    let index = |x: u32, y: u32| y as usize * width as usize + x as usize;
    let mut visited: BitVec = BitVec::repeat(false, width as usize * height as usize);
    let mut stack = vec![(seed_x, seed_y)];
    let mut rows: Option<Range<u32>> = None;

    while let Some((x, y)) = stack.pop() {
        if visited[index(x, y)] {
            continue;
        }
        let mut left = x;
        while left > 0
            && !visited[index(left - 1, y)]
            && within(target.pixel(left - 1, y), seed, limit)
        {
            left -= 1;
        }
        let mut right = x;
        while right + 1 < width
            && !visited[index(right + 1, y)]
            && within(target.pixel(right + 1, y), seed, limit)
        {
            right += 1;
        }
        for span_x in left..=right {
            visited.set(index(span_x, y), true);
            target.set_pixel(span_x, y, color);
        }
        rows = Some(match rows {
            Some(range) => range.start.min(y)..range.end.max(y + 1),
            None => y..y + 1,
        });

        let neighbours = [y.checked_sub(1), (y + 1 < height).then_some(y + 1)];
        for row in neighbours.into_iter().flatten() {
            let mut in_run = false;
            for span_x in left..=right {
                let open = !visited[index(span_x, row)]
                    && within(target.pixel(span_x, row), seed, limit);
                if open && !in_run {
                    stack.push((span_x, row));
                }
                in_run = open;
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas_with_wall() -> RasterBuffer {
        let mut buffer = RasterBuffer::new(10, 6).expect("alloc");
        for y in 0..6 {
            buffer.set_pixel(5, y, Rgba8::BLACK);
        }
        buffer
    }

    #[test]
    fn fill_stops_at_boundary() {
        let mut buffer = canvas_with_wall();
        let rows = flood_fill(&mut buffer, 1.0, 1.0, Rgba8::opaque(0, 255, 0), 0.0);
        assert_eq!(rows, Some(0..6));
        assert_eq!(buffer.pixel(0, 5), Rgba8::opaque(0, 255, 0));
        assert_eq!(buffer.pixel(4, 0), Rgba8::opaque(0, 255, 0));
        assert_eq!(buffer.pixel(5, 3), Rgba8::BLACK);
        assert_eq!(buffer.alpha(6, 3), 0);
    }

    #[test]
    fn fill_wraps_around_obstacles() {
        let mut buffer = RasterBuffer::new(7, 7).expect("alloc");
        for x in 1..6 {
            buffer.set_pixel(x, 3, Rgba8::BLACK);
        }
        flood_fill(&mut buffer, 3.0, 1.0, Rgba8::WHITE, 0.0);
        assert_eq!(buffer.pixel(3, 5), Rgba8::WHITE);
        assert_eq!(buffer.pixel(3, 3), Rgba8::BLACK);
    }

    #[test]
    fn tolerance_admits_similar_colors() {
        let mut buffer = RasterBuffer::new(4, 1).expect("alloc");
        buffer.fill(Rgba8::opaque(100, 100, 100));
        buffer.set_pixel(2, 0, Rgba8::opaque(110, 100, 100));
        let mut strict = buffer.try_clone().expect("clone");
        flood_fill(&mut strict, 0.0, 0.0, Rgba8::WHITE, 0.0);
        assert_eq!(strict.pixel(1, 0), Rgba8::WHITE);
        assert_eq!(strict.pixel(3, 0), Rgba8::opaque(100, 100, 100));

        flood_fill(&mut buffer, 0.0, 0.0, Rgba8::WHITE, 0.05);
        assert_eq!(buffer.pixel(3, 0), Rgba8::WHITE);
    }

    #[test]
    fn refilling_with_seed_color_terminates() {
        let mut buffer = RasterBuffer::new(5, 5).expect("alloc");
        let rows = flood_fill(&mut buffer, 2.0, 2.0, Rgba8::TRANSPARENT, 0.0);
        assert_eq!(rows, Some(0..5));
    }

    #[test]
    fn seed_outside_fills_nothing() {
        let mut buffer = RasterBuffer::new(5, 5).expect("alloc");
        assert_eq!(flood_fill(&mut buffer, 9.0, 1.0, Rgba8::WHITE, 0.0), None);
        assert_eq!(flood_fill(&mut buffer, -1.0, 1.0, Rgba8::WHITE, 0.0), None);
        assert!(buffer.is_transparent());
    }
}
