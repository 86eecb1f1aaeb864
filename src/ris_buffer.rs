use crate::error::{ConfigurationIssue, ContextResult};
use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

/// Requested shape of one RIS tile set: `tile_count` tiles of `tile_size` presampled lights.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RisBufferParameters {
    pub tile_size: u32,
    pub tile_count: u32,
}

impl Default for RisBufferParameters {
    fn default() -> Self {
        Self {
            tile_size: 1024,
            tile_count: 128,
        }
    }
}

impl RisBufferParameters {
    pub fn element_count(&self) -> u32 {
        self.tile_size.saturating_mul(self.tile_count)
    }
}

/// Sub-range of the shared RIS buffer, mirrored into shader constants.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RisBufferSegmentParameters {
    pub buffer_offset: u32,
    pub tile_size: u32,
    pub tile_count: u32,
    _pad: u32,
}

impl RisBufferSegmentParameters {
    pub fn new(buffer_offset: u32, params: RisBufferParameters) -> Self {
        Self {
            buffer_offset,
            tile_size: params.tile_size,
            tile_count: params.tile_count,
            _pad: 0,
        }
    }

    pub fn element_count(&self) -> u32 {
        self.tile_size * self.tile_count
    }

    /// Half-open element range this segment covers.
    pub fn range(&self) -> std::ops::Range<u32> {
        self.buffer_offset..self.buffer_offset + self.element_count()
    }
}

/// Append-only bump allocator over one RIS buffer.
///
/// Only the owning context allocates, and only while it is being constructed;
/// afterwards the running total is what the GPU buffer gets sized from.
#[derive(Debug, Default, Clone)]
pub struct RisBufferSegmentAllocator {
    total_size_in_elements: u32,
}

impl RisBufferSegmentAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `size_in_elements` and return the offset the segment starts at.
    ///
    /// Fails without changing the total when the buffer would outgrow u32 indexing.
    pub fn allocate_segment(&mut self, size_in_elements: u32) -> ContextResult<u32> {
        let start = self.total_size_in_elements;
        self.total_size_in_elements = start
            .checked_add(size_in_elements)
            .ok_or(ConfigurationIssue::SizeOverflow("RIS buffer"))?;
        Ok(start)
    }

    pub fn total_size_in_elements(&self) -> u32 {
        self.total_size_in_elements
    }
}
