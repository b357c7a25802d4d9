// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The logical buffer: staging store, resolved mirror and direct-buffer pool behind one API.

use super::config::StorageConfig;
use super::direct_pool::DirectBufferPool;
use super::dirty_tracking::Serial;
use super::resolved::ResolvedDataCache;
use super::staging::StagingStore;
use super::visible_to::BufferUsage;
use super::Error;
use crate::device::{Device, DeviceError};
use std::sync::Arc;

/// Read and write usage counters, see [`BufferStorage::on_bound_for_use`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageCounts {
    /// Bind cycles since the last [`BufferStorage::read`].
    pub read: u32,
    /// Bind cycles since the last write.
    pub write: u32,
}

/**
A GPU buffer whose bytes live in a CPU-visible staging resource.

Writes go to staging.  Reads are served from a CPU mirror that is filled from staging on the
first read after a write.  Binding goes through [`device_buffer_for`](Self::device_buffer_for),
which hands out a device-local buffer per [`BufferUsage`] and copies staging into it only when
a write happened since the last bind.

Every mutating method takes `&mut self`.  A storage is meant to be driven from one rendering
thread; share it between threads behind a `Mutex`.

```
use buffer_storage::imp::software::SoftwareDevice;
use buffer_storage::storage::{BufferStorage, StorageConfig};
use buffer_storage::storage::visible_to::BufferUsage;
use std::sync::Arc;

let device = Arc::new(SoftwareDevice::new());
let mut storage = BufferStorage::new(device, StorageConfig::new("quad"));
storage.write(b"ABCD", 0)?;
storage.write(b"XY", 1)?;
assert_eq!(storage.read()?, b"AXYD");
let vertices = storage.device_buffer_for(BufferUsage::VertexBuffer)?;
assert_eq!(vertices.contents(), b"AXYD");
# Ok::<(), buffer_storage::storage::Error>(())
```
*/
#[derive(Debug)]
pub struct BufferStorage<D: Device> {
    device: Arc<D>,
    staging: StagingStore<D>,
    resolved: ResolvedDataCache,
    direct: DirectBufferPool<D>,
    serial: Serial,
    config: StorageConfig,
}

fn exhausted(operation: &'static str, err: DeviceError) -> Error {
    logwise::error_sync!(
        "BufferStorage::{operation} failed: {err}",
        operation = logwise::privacy::LogIt(&operation),
        err = logwise::privacy::LogIt(&err)
    );
    Error::ResourceExhausted(err)
}

impl<D: Device> BufferStorage<D> {
    /// Creates an empty storage.  No device resources are allocated until the first write.
    pub fn new(device: Arc<D>, config: StorageConfig) -> Self {
        BufferStorage {
            staging: StagingStore::new(device.clone(), config.debug_name()),
            resolved: ResolvedDataCache::new(config.eviction_threshold()),
            direct: DirectBufferPool::new(),
            serial: Serial::next(),
            device,
            config,
        }
    }

    fn after_write(&mut self) {
        self.resolved.invalidate_for_write();
        self.direct.mark_all_dirty();
    }

    /**
    Writes `data` at byte `offset`, growing the buffer if needed.

    Bytes in front of `offset` survive even when the staging resource has to be replaced.
    On error nothing observable changes.
    */
    pub fn write(&mut self, data: &[u8], offset: usize) -> Result<(), Error> {
        self.staging
            .write(Some(data), data.len(), offset)
            .map_err(|err| exhausted("write", err))?;
        self.after_write();
        Ok(())
    }

    /**
    Grows the logical size to cover `size` bytes at `offset` without supplying data.

    The contents of the reserved range are unspecified until written.
    */
    pub fn reserve(&mut self, size: usize, offset: usize) -> Result<(), Error> {
        self.staging
            .write(None, size, offset)
            .map_err(|err| exhausted("reserve", err))?;
        self.after_write();
        Ok(())
    }

    /**
    Returns the buffer's content, `size()` bytes long.

    The returned slice borrows the storage, so it stays valid until the next write or clear.
    */
    pub fn read(&mut self) -> Result<&[u8], Error> {
        self.resolved
            .resolve(&self.staging)
            .map_err(|err| exhausted("read", err))
    }

    /// Logical length of the content in bytes.
    pub fn size(&self) -> usize {
        self.staging.size()
    }

    /**
    Returns the device-local buffer for `usage`, ready to bind.

    The buffer is created on first request and refreshed from staging when a write happened
    since it was last handed out.  When a buffer is created or replaced, [`serial`](Self::serial)
    changes.
    */
    pub fn device_buffer_for(&mut self, usage: BufferUsage) -> Result<&D::DeviceBuffer, Error> {
        let (buffer, reallocated) = self
            .direct
            .acquire(usage, self.device.as_ref(), &self.staging, self.config.debug_name())
            .map_err(|err| exhausted("device_buffer_for", err))?;
        if reallocated {
            self.serial = Serial::next();
        }
        Ok(buffer)
    }

    /**
    Copies `size` bytes of `source`'s content at `source_offset` to `destination_offset` in this
    storage, device-side.

    Counts as a write.  A source range past the end of `source`'s content is reported as an
    error and nothing is copied.
    */
    pub fn copy_from(
        &mut self,
        source: &BufferStorage<D>,
        size: usize,
        source_offset: usize,
        destination_offset: usize,
    ) -> Result<(), Error> {
        self.staging
            .copy_region(&source.staging, size, source_offset, destination_offset)
            .map_err(|err| exhausted("copy_from", err))?;
        self.after_write();
        Ok(())
    }

    /// Resets the size to 0.  Allocated resources are kept for reuse.
    pub fn clear(&mut self) {
        self.staging.clear();
        self.resolved.invalidate();
    }

    /**
    Advances the usage counters by one bind cycle.

    Renderers call this once per cycle in which the buffer is used.  When more than the
    configured threshold of cycles pass without a [`read`](Self::read), the CPU mirror is freed.
    */
    pub fn on_bound_for_use(&mut self) {
        if self.resolved.mark_usage() {
            logwise::trace_sync!(
                "Evicted resolved mirror of {name}",
                name = logwise::privacy::LogIt(self.config.debug_name())
            );
        }
    }

    /// Changes whenever a device buffer handed out by this storage is created or replaced.
    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn staging_capacity(&self) -> usize {
        self.staging.capacity()
    }

    pub fn has_resolved_mirror(&self) -> bool {
        self.resolved.has_mirror()
    }

    /// Whether the next [`read`](Self::read) can be served without touching the device.
    pub fn is_resolved_valid(&self) -> bool {
        self.resolved.is_valid()
    }

    pub fn usage_counts(&self) -> UsageCounts {
        UsageCounts {
            read: self.resolved.read_usage_count(),
            write: self.resolved.write_usage_count(),
        }
    }

    /// Capacity of the pooled device buffer for `usage`, if one has been created.
    pub fn direct_buffer_capacity(&self, usage: BufferUsage) -> Option<usize> {
        self.direct.capacity(usage)
    }

    /// Whether the pooled device buffer for `usage` needs a refresh, if one has been created.
    pub fn is_direct_buffer_dirty(&self, usage: BufferUsage) -> Option<bool> {
        self.direct.is_dirty(usage)
    }

    /// Number of usages with a pooled device buffer.
    pub fn direct_buffer_count(&self) -> usize {
        self.direct.len()
    }

    pub fn debug_name(&self) -> &str {
        self.config.debug_name()
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }
}
