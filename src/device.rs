// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The graphics device capability consumed by [`BufferStorage`](crate::storage::BufferStorage).
//!
//! A device hands out two kinds of resources:
//!
//! - **staging buffers**, which the CPU can map for reading and writing, and which
//!   serve as the authoritative copy of a buffer's bytes;
//! - **device buffers**, which live in GPU-local memory, can't be mapped, and are
//!   what actually gets bound for drawing.
//!
//! Resources are released when they are dropped.  Mapping is scoped: the mapped bytes
//! are handed to a closure and the resource is unmapped when the closure returns.
//!
//! Two implementations ship with the crate: [`SoftwareDevice`](crate::imp::software::SoftwareDevice),
//! which keeps everything in host memory, and (with the `backend_wgpu` feature)
//! `WgpuDevice`.

use crate::storage::visible_to::BindingConfig;
use std::fmt::Debug;
use std::ops::Range;

/// A failure reported by the device.
///
/// Every variant is surfaced to callers of [`BufferStorage`](crate::storage::BufferStorage)
/// as [`Error::ResourceExhausted`](crate::storage::Error::ResourceExhausted).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("could not allocate {size} bytes: {reason}")]
    Allocation { size: usize, reason: String },
    #[error("could not map buffer: {0}")]
    Map(String),
    #[error("region copy failed: {0}")]
    Copy(String),
}

/**
A graphics device that can create, map and copy between buffer resources.

All calls are synchronous and may block the calling thread until the driver completes them.
*/
pub trait Device {
    /// A CPU-visible resource.
    type StagingBuffer: Debug;
    /// A device-local resource that can be bound for drawing.
    type DeviceBuffer: Debug;

    /**
    Creates a staging buffer of `size` bytes.

    When `initial_data` is provided it is placed at offset 0; it is never longer than `size`.
    Bytes not covered by `initial_data` have unspecified contents.
    */
    fn create_staging_buffer(
        &self,
        size: usize,
        initial_data: Option<&[u8]>,
        debug_name: &str,
    ) -> Result<Self::StagingBuffer, DeviceError>;

    /// Creates a device-local buffer of `size` bytes with the given binding capabilities.
    fn create_device_buffer(
        &self,
        size: usize,
        binding: BindingConfig,
        debug_name: &str,
    ) -> Result<Self::DeviceBuffer, DeviceError>;

    /// Maps `range` of a staging buffer for reading.
    fn map_read<R>(
        &self,
        buffer: &Self::StagingBuffer,
        range: Range<usize>,
        read: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, DeviceError>;

    /// Maps `range` of a staging buffer for writing.  The existing contents are visible to `write`.
    fn map_write<R>(
        &self,
        buffer: &mut Self::StagingBuffer,
        range: Range<usize>,
        write: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, DeviceError>;

    /// Copies `len` bytes between two staging buffers without a CPU round trip.
    fn copy_staging_region(
        &self,
        source: &Self::StagingBuffer,
        source_offset: usize,
        destination: &mut Self::StagingBuffer,
        destination_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError>;

    /// Copies `len` bytes from a staging buffer into a device buffer.
    fn copy_to_device_buffer(
        &self,
        source: &Self::StagingBuffer,
        source_offset: usize,
        destination: &mut Self::DeviceBuffer,
        destination_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError>;
}
