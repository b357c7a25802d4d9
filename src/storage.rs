// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Buffer storage.

A [BufferStorage] is made of three parts, leaves first:

1. the staging store, owning the CPU-visible resource that holds the authoritative bytes;
2. the resolved-data cache, a CPU mirror of staging for repeated reads;
3. the direct-buffer pool, device-local buffers per [visible_to::BufferUsage].
*/

mod buffer_storage;
pub mod config;
mod direct_pool;
pub mod dirty_tracking;
mod resolved;
mod staging;
pub mod visible_to;

pub use buffer_storage::{BufferStorage, UsageCounts};
pub use config::StorageConfig;
pub use dirty_tracking::Serial;

use crate::device::DeviceError;

/// The one failure a [BufferStorage] reports.
///
/// Allocation, mapping and copy failures all end up here.  The operation that failed
/// had no observable effect, so the caller may drop the draw and try again next frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("resource exhausted: {0}")]
    ResourceExhausted(#[from] DeviceError),
}
