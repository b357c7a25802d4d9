// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A device that keeps every resource in host memory.

Besides being a usable backend on machines without a GPU, the software device counts
every call it receives and can be told to fail, which is how the test suite observes
copies, allocations and release of resources.
*/

use crate::device::{Device, DeviceError};
use crate::storage::visible_to::BindingConfig;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A class of device call that can be made to fail with [SoftwareDevice::set_fault].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Creating staging or device buffers fails.
    Allocation,
    /// Mapping staging buffers fails.
    Map,
    /// Region copies fail.
    Copy,
}

#[derive(Debug, Default)]
struct Counters {
    staging_buffers_created: AtomicUsize,
    device_buffers_created: AtomicUsize,
    map_reads: AtomicUsize,
    map_writes: AtomicUsize,
    staging_copies: AtomicUsize,
    device_copies: AtomicUsize,
    live_staging_buffers: AtomicUsize,
    live_device_buffers: AtomicUsize,
    live_bytes: AtomicUsize,
}

/// A snapshot of a [SoftwareDevice]'s counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStats {
    pub staging_buffers_created: usize,
    pub device_buffers_created: usize,
    pub map_reads: usize,
    pub map_writes: usize,
    /// Staging-to-staging region copies.
    pub staging_copies: usize,
    /// Staging-to-device region copies.
    pub device_copies: usize,
    pub live_staging_buffers: usize,
    pub live_device_buffers: usize,
    /// Bytes held by live resources of either kind.
    pub live_bytes: usize,
}

#[derive(Debug, Default)]
pub struct SoftwareDevice {
    counters: Arc<Counters>,
    fail_allocations: AtomicBool,
    fail_maps: AtomicBool,
    fail_copies: AtomicBool,
}

#[derive(Debug)]
pub struct SoftwareStagingBuffer {
    bytes: Box<[u8]>,
    counters: Arc<Counters>,
}

#[derive(Debug)]
pub struct SoftwareDeviceBuffer {
    bytes: Box<[u8]>,
    binding: BindingConfig,
    counters: Arc<Counters>,
}

impl SoftwareStagingBuffer {
    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }
}

impl SoftwareDeviceBuffer {
    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }
    pub fn binding(&self) -> BindingConfig {
        self.binding
    }
}

impl Drop for SoftwareStagingBuffer {
    fn drop(&mut self) {
        self.counters.live_staging_buffers.fetch_sub(1, Ordering::Relaxed);
        self.counters.live_bytes.fetch_sub(self.bytes.len(), Ordering::Relaxed);
    }
}

impl Drop for SoftwareDeviceBuffer {
    fn drop(&mut self) {
        self.counters.live_device_buffers.fetch_sub(1, Ordering::Relaxed);
        self.counters.live_bytes.fetch_sub(self.bytes.len(), Ordering::Relaxed);
    }
}

fn check_range(range: &Range<usize>, len: usize) -> Result<(), String> {
    if range.start > range.end || range.end > len {
        Err(format!("range {range:?} out of bounds for buffer of {len} bytes"))
    } else {
        Ok(())
    }
}

/// Allocates `size` zeroed bytes, reporting failure instead of aborting.
fn zeroed(size: usize) -> Result<Box<[u8]>, DeviceError> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(size)
        .map_err(|err| DeviceError::Allocation {
            size,
            reason: err.to_string(),
        })?;
    bytes.resize(size, 0);
    Ok(bytes.into_boxed_slice())
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call of the given class fail (or succeed again).
    pub fn set_fault(&self, fault: Fault, enabled: bool) {
        let flag = match fault {
            Fault::Allocation => &self.fail_allocations,
            Fault::Map => &self.fail_maps,
            Fault::Copy => &self.fail_copies,
        };
        flag.store(enabled, Ordering::Relaxed);
    }

    pub fn stats(&self) -> DeviceStats {
        let c = &self.counters;
        DeviceStats {
            staging_buffers_created: c.staging_buffers_created.load(Ordering::Relaxed),
            device_buffers_created: c.device_buffers_created.load(Ordering::Relaxed),
            map_reads: c.map_reads.load(Ordering::Relaxed),
            map_writes: c.map_writes.load(Ordering::Relaxed),
            staging_copies: c.staging_copies.load(Ordering::Relaxed),
            device_copies: c.device_copies.load(Ordering::Relaxed),
            live_staging_buffers: c.live_staging_buffers.load(Ordering::Relaxed),
            live_device_buffers: c.live_device_buffers.load(Ordering::Relaxed),
            live_bytes: c.live_bytes.load(Ordering::Relaxed),
        }
    }

    fn check_allocation(&self, size: usize) -> Result<(), DeviceError> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(DeviceError::Allocation {
                size,
                reason: "injected fault".to_string(),
            });
        }
        Ok(())
    }

    fn check_copy(&self) -> Result<(), DeviceError> {
        if self.fail_copies.load(Ordering::Relaxed) {
            return Err(DeviceError::Copy("injected fault".to_string()));
        }
        Ok(())
    }

    fn check_map(&self) -> Result<(), DeviceError> {
        if self.fail_maps.load(Ordering::Relaxed) {
            return Err(DeviceError::Map("injected fault".to_string()));
        }
        Ok(())
    }

    fn track_allocation(&self, size: usize) {
        self.counters.live_bytes.fetch_add(size, Ordering::Relaxed);
    }
}

impl Device for SoftwareDevice {
    type StagingBuffer = SoftwareStagingBuffer;
    type DeviceBuffer = SoftwareDeviceBuffer;

    fn create_staging_buffer(
        &self,
        size: usize,
        initial_data: Option<&[u8]>,
        _debug_name: &str,
    ) -> Result<Self::StagingBuffer, DeviceError> {
        self.check_allocation(size)?;
        if let Some(data) = initial_data.filter(|data| data.len() > size) {
            return Err(DeviceError::Allocation {
                size,
                reason: format!("initial data of {} bytes does not fit", data.len()),
            });
        }
        let mut bytes = zeroed(size)?;
        if let Some(data) = initial_data {
            bytes[..data.len()].copy_from_slice(data);
        }
        self.counters.staging_buffers_created.fetch_add(1, Ordering::Relaxed);
        self.counters.live_staging_buffers.fetch_add(1, Ordering::Relaxed);
        self.track_allocation(size);
        Ok(SoftwareStagingBuffer {
            bytes,
            counters: self.counters.clone(),
        })
    }

    fn create_device_buffer(
        &self,
        size: usize,
        binding: BindingConfig,
        _debug_name: &str,
    ) -> Result<Self::DeviceBuffer, DeviceError> {
        self.check_allocation(size)?;
        let bytes = zeroed(size)?;
        self.counters.device_buffers_created.fetch_add(1, Ordering::Relaxed);
        self.counters.live_device_buffers.fetch_add(1, Ordering::Relaxed);
        self.track_allocation(size);
        Ok(SoftwareDeviceBuffer {
            bytes,
            binding,
            counters: self.counters.clone(),
        })
    }

    fn map_read<R>(
        &self,
        buffer: &Self::StagingBuffer,
        range: Range<usize>,
        read: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, DeviceError> {
        self.check_map()?;
        check_range(&range, buffer.bytes.len()).map_err(DeviceError::Map)?;
        self.counters.map_reads.fetch_add(1, Ordering::Relaxed);
        Ok(read(&buffer.bytes[range]))
    }

    fn map_write<R>(
        &self,
        buffer: &mut Self::StagingBuffer,
        range: Range<usize>,
        write: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, DeviceError> {
        self.check_map()?;
        check_range(&range, buffer.bytes.len()).map_err(DeviceError::Map)?;
        self.counters.map_writes.fetch_add(1, Ordering::Relaxed);
        Ok(write(&mut buffer.bytes[range]))
    }

    fn copy_staging_region(
        &self,
        source: &Self::StagingBuffer,
        source_offset: usize,
        destination: &mut Self::StagingBuffer,
        destination_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError> {
        self.check_copy()?;
        let source_range = source_offset..source_offset + len;
        let destination_range = destination_offset..destination_offset + len;
        check_range(&source_range, source.bytes.len()).map_err(DeviceError::Copy)?;
        check_range(&destination_range, destination.bytes.len()).map_err(DeviceError::Copy)?;
        destination.bytes[destination_range].copy_from_slice(&source.bytes[source_range]);
        self.counters.staging_copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn copy_to_device_buffer(
        &self,
        source: &Self::StagingBuffer,
        source_offset: usize,
        destination: &mut Self::DeviceBuffer,
        destination_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError> {
        self.check_copy()?;
        let source_range = source_offset..source_offset + len;
        let destination_range = destination_offset..destination_offset + len;
        check_range(&source_range, source.bytes.len()).map_err(DeviceError::Copy)?;
        check_range(&destination_range, destination.bytes.len()).map_err(DeviceError::Copy)?;
        destination.bytes[destination_range].copy_from_slice(&source.bytes[source_range]);
        self.counters.device_copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
