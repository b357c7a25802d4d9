// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The staging store: the authoritative, CPU-visible copy of a buffer's bytes.
//!
//! The store owns at most one staging resource.  A write that needs more room than the
//! resource has replaces it with a larger one of exactly the required capacity; the old
//! resource's bytes in front of the write offset are carried over with a device-side copy.
//!
//! Every fallible device call happens before anything is committed, so a failed operation
//! leaves size, capacity and content untouched.

use crate::device::{Device, DeviceError};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct StagingStore<D: Device> {
    device: Arc<D>,
    buffer: Option<D::StagingBuffer>,
    capacity: usize,
    size: usize,
    debug_name: String,
}

fn required_capacity(offset: usize, len: usize) -> Result<usize, DeviceError> {
    offset.checked_add(len).ok_or_else(|| DeviceError::Allocation {
        size: usize::MAX,
        reason: "requested range overflows the address space".to_string(),
    })
}

impl<D: Device> StagingStore<D> {
    pub(crate) fn new(device: Arc<D>, debug_name: &str) -> Self {
        StagingStore {
            device,
            buffer: None,
            capacity: 0,
            size: 0,
            debug_name: debug_name.to_string(),
        }
    }

    /// Logical length of the valid content.
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Allocated length of the staging resource; 0 when there is none.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn buffer(&self) -> Option<&D::StagingBuffer> {
        self.buffer.as_ref()
    }

    /**
    Creates a replacement staging resource of `capacity` bytes.

    When `offset` is 0 the new resource is created with `data` as its initial contents.
    Otherwise the current resource's bytes in `[0, offset)` are copied forward.
    */
    fn allocate(
        &self,
        capacity: usize,
        offset: usize,
        data: Option<&[u8]>,
    ) -> Result<D::StagingBuffer, DeviceError> {
        logwise::trace_sync!(
            "Allocating staging buffer {name} with capacity {capacity}",
            name = logwise::privacy::LogIt(&self.debug_name),
            capacity = capacity
        );
        let initial_data = if offset == 0 { data } else { None };
        let mut fresh = self
            .device
            .create_staging_buffer(capacity, initial_data, &self.debug_name)?;
        if let Some(previous) = &self.buffer {
            //the old resource is smaller than the new one, so only its own bytes can be preserved
            let preserved = offset.min(self.capacity);
            if preserved > 0 {
                self.device
                    .copy_staging_region(previous, 0, &mut fresh, 0, preserved)?;
            }
        }
        Ok(fresh)
    }

    /**
    Writes `len` bytes at `offset`, growing the staging resource when needed.

    `data` of `None` reserves the range without defining its contents.
    */
    pub(crate) fn write(
        &mut self,
        data: Option<&[u8]>,
        len: usize,
        offset: usize,
    ) -> Result<(), DeviceError> {
        debug_assert!(data.is_none_or(|d| d.len() == len));
        let required = required_capacity(offset, len)?;
        let mut replacement = if self.buffer.is_none() || self.capacity < required {
            Some(self.allocate(required, offset, data)?)
        } else {
            None
        };
        let directly_initialized = replacement.is_some() && offset == 0;

        if let Some(data) = data.filter(|_| !directly_initialized) {
            let target = match (replacement.as_mut(), self.buffer.as_mut()) {
                (Some(target), _) | (None, Some(target)) => target,
                (None, None) => {
                    return Err(DeviceError::Map("no staging buffer to write into".to_string()));
                }
            };
            self.device
                .map_write(target, offset..required, |mapped| mapped.copy_from_slice(data))?;
        }

        if let Some(fresh) = replacement {
            //old resource is released here
            self.buffer = Some(fresh);
            self.capacity = required;
        }
        self.size = self.size.max(required);
        Ok(())
    }

    /// Copies the first `destination.len()` bytes of content into `destination`.
    pub(crate) fn read_into(&self, destination: &mut [u8]) -> Result<(), DeviceError> {
        debug_assert!(destination.len() <= self.size);
        let Some(buffer) = &self.buffer else {
            return Ok(());
        };
        if destination.is_empty() {
            return Ok(());
        }
        let len = destination.len();
        self.device
            .map_read(buffer, 0..len, |mapped| destination.copy_from_slice(mapped))
    }

    /**
    Copies `len` bytes from `source`'s staging resource into this one, device-side.

    Fails without touching either store if `source` does not hold content covering
    `[source_offset, source_offset + len)`.
    */
    pub(crate) fn copy_region(
        &mut self,
        source: &StagingStore<D>,
        len: usize,
        source_offset: usize,
        destination_offset: usize,
    ) -> Result<(), DeviceError> {
        if len == 0 {
            return Ok(());
        }
        let source_end = required_capacity(source_offset, len)?;
        let source_buffer = match &source.buffer {
            Some(buffer) if source_end <= source.size => buffer,
            _ => {
                return Err(DeviceError::Copy(format!(
                    "copy source range {source_offset}..{source_end} exceeds source size {}",
                    source.size
                )));
            }
        };
        let required = required_capacity(destination_offset, len)?;
        let mut replacement = if self.buffer.is_none() || self.capacity < required {
            Some(self.allocate(required, destination_offset, None)?)
        } else {
            None
        };
        let target = match (replacement.as_mut(), self.buffer.as_mut()) {
            (Some(target), _) | (None, Some(target)) => target,
            (None, None) => {
                return Err(DeviceError::Copy("no staging buffer to copy into".to_string()));
            }
        };
        self.device
            .copy_staging_region(source_buffer, source_offset, target, destination_offset, len)?;

        if let Some(fresh) = replacement {
            self.buffer = Some(fresh);
            self.capacity = required;
        }
        self.size = self.size.max(required);
        Ok(())
    }

    /// Forgets the content.  The staging resource is kept for reuse.
    pub(crate) fn clear(&mut self) {
        self.size = 0;
    }
}
