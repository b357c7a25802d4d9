// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Usage declarations for device-local buffers.
//!
//! A [`BufferStorage`](super::BufferStorage) keeps one device-local buffer per usage.  The
//! usage decides which binding capabilities the device must grant the buffer, and how
//! large the buffer has to be for a given amount of content.
//!
//! # Examples
//!
//! ```
//! use buffer_storage::storage::visible_to::BufferUsage;
//!
//! let usage = BufferUsage::VertexBuffer;
//! assert!(usage.binding_config().vertex);
//! assert_eq!(BufferUsage::Uniform.required_capacity(20), 32);
//! ```

use crate::bittricks::align_up;

/// Uniform buffers are allocated in multiples of this many bytes.
pub const UNIFORM_BUFFER_ALIGNMENT: usize = 16;

/// Describes how a device-local buffer will be bound on the GPU.
///
/// Byte layout is identical across usages, apart from the capacity rounding
/// described on [`BufferUsage::required_capacity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// The buffer contains vertex attribute data.
    ///
    /// This buffer will be bound as a vertex buffer and its contents will be
    /// interpreted according to the vertex layout specified in the pipeline.
    VertexBuffer,

    /// The buffer contains index data for indexed drawing.
    Index,

    /// The buffer is bound as a uniform (constant) buffer.
    Uniform,
}

/// The device-creation flags a usage requires.
///
/// Backends translate this into their native flag sets, e.g. `wgpu::BufferUsages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindingConfig {
    pub vertex: bool,
    pub index: bool,
    pub uniform: bool,
    /// The buffer is the destination of staging copies.  Set for every pooled buffer.
    pub copy_destination: bool,
}

impl BufferUsage {
    /// Every usage, in declaration order.
    pub const ALL: [BufferUsage; 3] = [BufferUsage::VertexBuffer, BufferUsage::Index, BufferUsage::Uniform];

    /// The binding flags a device buffer for this usage is created with.
    pub const fn binding_config(self) -> BindingConfig {
        let base = BindingConfig {
            vertex: false,
            index: false,
            uniform: false,
            copy_destination: true,
        };
        match self {
            BufferUsage::VertexBuffer => BindingConfig { vertex: true, ..base },
            BufferUsage::Index => BindingConfig { index: true, ..base },
            BufferUsage::Uniform => BindingConfig { uniform: true, ..base },
        }
    }

    /**
    The capacity a device buffer needs to hold `size` bytes of content.

    Vertex and index buffers are sized exactly; uniform buffers are rounded up to
    [`UNIFORM_BUFFER_ALIGNMENT`].
    */
    pub const fn required_capacity(self, size: usize) -> usize {
        match self {
            BufferUsage::VertexBuffer | BufferUsage::Index => size,
            BufferUsage::Uniform => align_up(size, UNIFORM_BUFFER_ALIGNMENT),
        }
    }
}
