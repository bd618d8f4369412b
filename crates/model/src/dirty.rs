use std::ops::Range;

use bitvec::prelude::{BitVec, Lsb0};

/// Per-row dirty bits for a canvas of fixed height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyRows {
    // bits.len() == height
    bits: BitVec<usize, Lsb0>,
    dirty_count: usize,
}

impl DirtyRows {
    pub fn clean(height: u32) -> Self {
        Self {
            bits: BitVec::repeat(false, height as usize),
            dirty_count: 0,
        }
    }

    pub fn full(height: u32) -> Self {
        Self {
            bits: BitVec::repeat(true, height as usize),
            dirty_count: height as usize,
        }
    }

    pub fn height(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty_count
    }

    pub fn is_clean(&self) -> bool {
        self.dirty_count == 0
    }

    pub fn is_full(&self) -> bool {
        self.dirty_count == self.bits.len()
    }

    pub fn is_row_dirty(&self, y: u32) -> bool {
        self.bits.get(y as usize).map(|bit| *bit).unwrap_or(false)
    }

    pub fn mark_all(&mut self) {
        self.bits.fill(true);
        self.dirty_count = self.bits.len();
    }

    /// Marks rows `[start, end)`, clamped to the canvas. Accepts signed bounds so
    /// callers can pass unclipped stamp extents.
    pub fn mark_span(&mut self, start: i64, end: i64) {
        let height = self.bits.len() as i64;
        let start = start.clamp(0, height) as usize;
        let end = end.clamp(0, height) as usize;
        for index in start..end {
            if !self.bits[index] {
                self.bits.set(index, true);
                self.dirty_count += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &DirtyRows) {
        assert_eq!(
            self.bits.len(),
            other.bits.len(),
            "dirty row sets must cover the same canvas height"
        );
        for index in other.bits.iter_ones() {
            if !self.bits[index] {
                self.bits.set(index, true);
                self.dirty_count += 1;
            }
        }
    }

    /// Contiguous dirty row ranges in ascending order.
    pub fn spans(&self) -> Vec<Range<u32>> {
        let mut spans: Vec<Range<u32>> = Vec::new();
        for index in self.bits.iter_ones() {
            let row = index as u32;
            match spans.last_mut() {
                Some(last) if last.end == row => last.end = row + 1,
                _ => spans.push(row..row + 1),
            }
        }
        spans
    }

    /// Returns the current marks and leaves this set clean.
    pub fn take(&mut self) -> DirtyRows {
        let height = self.height();
        std::mem::replace(self, DirtyRows::clean(height))
    }

    /// Re-targets to a new canvas height with every row dirty.
    pub fn reset_full(&mut self, height: u32) {
        *self = DirtyRows::full(height);
    }
}
