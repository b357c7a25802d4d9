// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The direct-buffer pool: one device-local buffer per usage, refreshed from staging on demand.

Each pooled buffer moves through `Absent -> Clean -> Dirty -> Clean -> ...`:

- the first request for a usage creates the buffer and fills it from staging;
- every staging write marks all pooled buffers dirty;
- the next request for a dirty buffer copies staging into it again, first replacing it with
  a larger one if the content outgrew it.

Capacity only grows.  A buffer sized for a large upload keeps that size after the content
shrinks, so steady-state frames never reallocate.
*/

use super::dirty_tracking::DirtyFlag;
use super::staging::StagingStore;
use super::visible_to::BufferUsage;
use crate::device::{Device, DeviceError};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

#[derive(Debug)]
pub(crate) struct PooledDirectBuffer<D: Device> {
    usage: BufferUsage,
    buffer: D::DeviceBuffer,
    capacity: usize,
    dirty: DirtyFlag,
}

fn copy_from_staging<D: Device>(
    device: &D,
    staging: &StagingStore<D>,
    target: &mut D::DeviceBuffer,
) -> Result<(), DeviceError> {
    match staging.buffer() {
        Some(source) if staging.size() > 0 => {
            let copy_perf = logwise::perfwarn_begin!("PooledDirectBuffer::copy_from_staging");
            let result = device.copy_to_device_buffer(source, 0, target, 0, staging.size());
            drop(copy_perf);
            result
        }
        //nothing written yet
        _ => Ok(()),
    }
}

impl<D: Device> PooledDirectBuffer<D> {
    fn create(
        device: &D,
        usage: BufferUsage,
        staging: &StagingStore<D>,
        debug_name: &str,
    ) -> Result<Self, DeviceError> {
        let capacity = usage.required_capacity(staging.size());
        logwise::trace_sync!(
            "Creating {usage} direct buffer with capacity {capacity}",
            usage = logwise::privacy::LogIt(&usage),
            capacity = capacity
        );
        let mut buffer = device.create_device_buffer(capacity, usage.binding_config(), debug_name)?;
        copy_from_staging(device, staging, &mut buffer)?;
        Ok(PooledDirectBuffer {
            usage,
            buffer,
            capacity,
            dirty: DirtyFlag::new(false),
        })
    }

    /**
    Brings the buffer up to date with staging.

    Returns true if the device buffer was replaced, false if the existing one was reused.
    On error the buffer, its capacity and its dirty flag are unchanged.
    */
    fn update_from_staging(
        &mut self,
        device: &D,
        staging: &StagingStore<D>,
        debug_name: &str,
    ) -> Result<bool, DeviceError> {
        let required = self.usage.required_capacity(staging.size());
        if self.capacity < required {
            logwise::trace_sync!(
                "Growing {usage} direct buffer from {old} to {new}",
                usage = logwise::privacy::LogIt(&self.usage),
                old = self.capacity,
                new = required
            );
            let mut fresh =
                device.create_device_buffer(required, self.usage.binding_config(), debug_name)?;
            copy_from_staging(device, staging, &mut fresh)?;
            self.buffer = fresh;
            self.capacity = required;
            self.dirty.mark_dirty(false);
            return Ok(true);
        }
        copy_from_staging(device, staging, &mut self.buffer)?;
        self.dirty.mark_dirty(false);
        Ok(false)
    }
}

#[derive(Debug)]
pub(crate) struct DirectBufferPool<D: Device> {
    buffers: HashMap<BufferUsage, PooledDirectBuffer<D>>,
}

impl<D: Device> DirectBufferPool<D> {
    pub(crate) fn new() -> Self {
        DirectBufferPool {
            buffers: HashMap::new(),
        }
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        for pooled in self.buffers.values_mut() {
            pooled.dirty.mark_dirty(true);
        }
    }

    /**
    Returns an up-to-date device buffer for `usage`, creating or refreshing it as needed.

    The flag is true when a device buffer was created or replaced, meaning bind state cached
    against the previous buffer is stale.
    */
    pub(crate) fn acquire(
        &mut self,
        usage: BufferUsage,
        device: &D,
        staging: &StagingStore<D>,
        debug_name: &str,
    ) -> Result<(&D::DeviceBuffer, bool), DeviceError> {
        let (pooled, reallocated) = match self.buffers.entry(usage) {
            Entry::Occupied(entry) => {
                let pooled = entry.into_mut();
                let reallocated = if pooled.dirty.is_dirty() {
                    pooled.update_from_staging(device, staging, debug_name)?
                } else {
                    false
                };
                (pooled, reallocated)
            }
            Entry::Vacant(entry) => {
                let pooled = PooledDirectBuffer::create(device, usage, staging, debug_name)?;
                (entry.insert(pooled), true)
            }
        };
        Ok((&pooled.buffer, reallocated))
    }

    pub(crate) fn capacity(&self, usage: BufferUsage) -> Option<usize> {
        self.buffers.get(&usage).map(|pooled| pooled.capacity)
    }

    pub(crate) fn is_dirty(&self, usage: BufferUsage) -> Option<bool> {
        self.buffers.get(&usage).map(|pooled| pooled.dirty.is_dirty())
    }

    pub(crate) fn len(&self) -> usize {
        self.buffers.len()
    }
}
