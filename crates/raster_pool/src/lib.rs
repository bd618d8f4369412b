//! Recycling allocator for canvas-sized pixel buffers.
//!
//! Every buffer handed out by [`RasterPool::acquire`] is *leased*; giving it
//! back with [`RasterPool::release`] puts it on the free list where a later
//! acquire of the same size picks it up again. Free entries are kept in
//! release order so trimming drops the least recently released first.

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};
use model::{BufferId, RasterBuffer, RasterError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoolError {
    #[error("buffer dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub active_count: usize,
    pub pooled_count: usize,
    /// Bytes held by leased and free buffers together.
    pub total_bytes: usize,
}

#[derive(Debug, Default)]
pub struct RasterPool {
    free: VecDeque<RasterBuffer>,
    leased: HashMap<BufferId, usize>,
    leased_bytes: usize,
    free_bytes: usize,
    max_free_entries: Option<usize>,
}

impl RasterPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_free_entries(max_free_entries: Option<usize>) -> Self {
        Self {
            max_free_entries,
            ..Self::default()
        }
    }

    pub fn max_free_entries(&self) -> Option<usize> {
        self.max_free_entries
    }

    /// Changes the free-list watermark and trims immediately.
    pub fn set_max_free_entries(&mut self, max_free_entries: Option<usize>) {
        self.max_free_entries = max_free_entries;
        self.trim_to_watermark();
    }

    /// Leases a zeroed buffer, reusing the most recently released free entry
    /// of the same size when there is one.
    pub fn acquire(&mut self, width: u32, height: u32) -> Result<RasterBuffer, PoolError> {
        if width == 0 || height == 0 {
            return Err(PoolError::InvalidDimensions { width, height });
        }
        let reusable = self
            .free
            .iter()
            .rposition(|buffer| buffer.dimensions() == (width, height));
        let buffer = match reusable.and_then(|index| self.free.remove(index)) {
            Some(mut buffer) => {
                self.free_bytes -= buffer.byte_len();
                buffer.clear();
                debug!("pool reuse {:?} {}x{}", buffer.id(), width, height);
                buffer
            }
            None => RasterBuffer::new(width, height)?,
        };
        self.record_lease(&buffer);
        Ok(buffer)
    }

    /// Leases a buffer holding a copy of `source`.
    pub fn acquire_copy(&mut self, source: &RasterBuffer) -> Result<RasterBuffer, PoolError> {
        let (width, height) = source.dimensions();
        let mut buffer = self.acquire(width, height)?;
        buffer.copy_from(source)?;
        Ok(buffer)
    }

    /// Returns a buffer to the free list. Contents are left as they are.
    pub fn release(&mut self, buffer: RasterBuffer) {
        match self.leased.remove(&buffer.id()) {
            Some(bytes) => self.leased_bytes -= bytes,
            None => warn!("pool adopting buffer {:?} it never leased", buffer.id()),
        }
        self.free_bytes += buffer.byte_len();
        self.free.push_back(buffer);
        self.trim_to_watermark();
    }

    pub fn is_leased(&self, id: BufferId) -> bool {
        self.leased.contains_key(&id)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active_count: self.leased.len(),
            pooled_count: self.free.len(),
            total_bytes: self.leased_bytes + self.free_bytes,
        }
    }

    /// Drops free entries until at most `keep` remain, oldest release first.
    pub fn trim(&mut self, keep: usize) -> usize {
        let mut dropped = 0;
        while self.free.len() > keep {
            let Some(buffer) = self.free.pop_front() else {
                break;
            };
            self.free_bytes -= buffer.byte_len();
            dropped += 1;
        }
        if dropped > 0 {
            debug!("pool trimmed {dropped} free buffers");
        }
        dropped
    }

    fn trim_to_watermark(&mut self) {
        if let Some(keep) = self.max_free_entries {
            self.trim(keep);
        }
    }

    fn record_lease(&mut self, buffer: &RasterBuffer) {
        let previous = self.leased.insert(buffer.id(), buffer.byte_len());
        if previous.is_some() {
            panic!("buffer leased twice");
        }
        self.leased_bytes += buffer.byte_len();
    }
}
