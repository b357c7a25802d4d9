// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Buffer resources for the wgpu backend.
//!
//! wgpu only allows `MAP_READ` together with `COPY_DST` and `MAP_WRITE` together with
//! `COPY_SRC`, so a buffer that is both mappable and a copy target on both ends can't be
//! expressed portably.  Staging buffers are therefore plain `COPY_SRC | COPY_DST` buffers:
//!
//! - reads copy the requested range into a short-lived `MAP_READ` buffer and map that;
//! - writes go through `Queue::write_buffer`.
//!
//! wgpu also requires copy offsets and sizes to be multiples of `COPY_BUFFER_ALIGNMENT`.
//! Allocations are rounded up, and byte ranges are widened to aligned ranges before they
//! reach the device.

use crate::bittricks::{align_down, align_up};
use crate::storage::visible_to::BindingConfig;
use std::ops::Range;
use wgpu::BufferUsages;

pub(super) const ALIGNMENT: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

/// Bytes actually allocated for a buffer holding `size` bytes.  Never 0.
pub(super) fn allocation_size(size: usize) -> usize {
    align_up(size.max(1), ALIGNMENT)
}

/// The smallest aligned range covering `range`.
pub(super) fn aligned_range(range: &Range<usize>) -> Range<usize> {
    align_down(range.start, ALIGNMENT)..align_up(range.end, ALIGNMENT)
}

pub(super) fn buffer_usages(binding: BindingConfig) -> BufferUsages {
    let mut usages = BufferUsages::empty();
    if binding.vertex {
        usages |= BufferUsages::VERTEX;
    }
    if binding.index {
        usages |= BufferUsages::INDEX;
    }
    if binding.uniform {
        usages |= BufferUsages::UNIFORM;
    }
    if binding.copy_destination {
        usages |= BufferUsages::COPY_DST;
    }
    usages
}

/**
A CPU-visible buffer.
*/
#[derive(Debug)]
pub struct WgpuStagingBuffer {
    pub(super) buffer: wgpu::Buffer,
    /// Requested size; the allocation may be larger.
    pub(super) size: usize,
}

impl WgpuStagingBuffer {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub(super) fn allocated(&self) -> usize {
        allocation_size(self.size)
    }
}

impl Drop for WgpuStagingBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

/**
A buffer that can (only) be accessed by the GPU.
*/
#[derive(Debug)]
pub struct WgpuDeviceBuffer {
    pub(super) buffer: wgpu::Buffer,
    pub(super) size: usize,
    pub(super) binding: BindingConfig,
}

impl WgpuDeviceBuffer {
    /// The buffer to bind.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn binding(&self) -> BindingConfig {
        self.binding
    }
    pub(super) fn allocated(&self) -> usize {
        allocation_size(self.size)
    }
}

impl Drop for WgpuDeviceBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}
