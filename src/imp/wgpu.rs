// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! wgpu backend.
//!
//! Every [`Device`] call is synchronous: GPU work is submitted and the device is polled
//! with [`wgpu::PollType::Wait`] until it completes.  Validation and out-of-memory errors
//! are captured with error scopes and reported as [`DeviceError`]s instead of reaching
//! wgpu's uncaptured-error handler.

mod buffer;
mod error;

pub use buffer::{WgpuDeviceBuffer, WgpuStagingBuffer};
pub use error::Error;

use crate::bittricks::{align_up, is_aligned};
use crate::device::{Device, DeviceError};
use crate::storage::visible_to::BindingConfig;
use buffer::{ALIGNMENT, aligned_range, allocation_size, buffer_usages};
use std::future::Future;
use std::ops::Range;
use std::pin::{Pin, pin};
use std::task::{Context, Poll, Waker};
use wgpu::{BufferDescriptor, BufferUsages, CommandEncoder, Label, PollType};

/// Polls `future` once, returning its output if it is ready.
fn poll_once<F: Future>(future: Pin<&mut F>) -> Option<F::Output> {
    let mut context = Context::from_waker(Waker::noop());
    match future.poll(&mut context) {
        Poll::Ready(output) => Some(output),
        Poll::Pending => None,
    }
}

fn check_range(range: &Range<usize>, size: usize) -> Result<(), String> {
    if range.start > range.end || range.end > size {
        Err(format!("range {range:?} out of bounds for buffer of {size} bytes"))
    } else {
        Ok(())
    }
}

/**
A [`Device`] backed by a wgpu device and queue.
*/
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuDevice {
    /// Wraps an existing device and queue, e.g. the ones the renderer already uses.
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        WgpuDevice { device, queue }
    }

    /// Requests the default adapter and creates a device on it.
    pub async fn new() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;
        let descriptor = wgpu::DeviceDescriptor {
            label: Label::from("buffer_storage"),
            required_features: Default::default(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        };
        let (device, queue) = adapter.request_device(&descriptor).await?;
        Ok(Self::from_parts(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /**
    Waits for a popped error scope to report.

    Native backends resolve the scope immediately or after the device is polled.  On the
    browser's WebGPU the result is delivered by the JS event loop, which can't run while we
    block, so an unresolved scope is reported as a failure rather than taken as success.
    */
    fn settle_scope(
        &self,
        scope: impl Future<Output = Option<wgpu::Error>>,
    ) -> Result<(), String> {
        let mut scope = pin!(scope);
        let outcome = match poll_once(scope.as_mut()) {
            Some(outcome) => outcome,
            None => {
                self.device
                    .poll(PollType::Wait)
                    .map_err(|err| format!("device poll failed: {err}"))?;
                match poll_once(scope.as_mut()) {
                    Some(outcome) => outcome,
                    None => {
                        logwise::warn_sync!("Error scope did not resolve after polling the device");
                        return Err("error scope did not resolve".to_string());
                    }
                }
            }
        };
        match outcome {
            Some(err) => Err(err.to_string()),
            None => Ok(()),
        }
    }

    /// Runs `operation` inside validation and out-of-memory error scopes.
    fn scoped<R>(&self, operation: impl FnOnce() -> R) -> Result<R, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = operation();
        //scopes pop in reverse order; both must be popped even if the first reports
        let validation = self.settle_scope(self.device.pop_error_scope());
        let out_of_memory = self.settle_scope(self.device.pop_error_scope());
        validation.and(out_of_memory)?;
        Ok(result)
    }

    fn wait(&self) -> Result<(), DeviceError> {
        self.device.poll(PollType::Wait)?;
        Ok(())
    }

    fn submit_copy(
        &self,
        label: &str,
        record: impl FnOnce(&mut CommandEncoder),
    ) -> Result<(), DeviceError> {
        self.scoped(|| {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Label::from(label),
                });
            record(&mut encoder);
            self.queue.submit(std::iter::once(encoder.finish()));
        })
        .map_err(DeviceError::Copy)
    }

    /// Reads an aligned range of `source` back to the CPU.
    fn read_aligned(
        &self,
        source: &wgpu::Buffer,
        aligned: Range<usize>,
    ) -> Result<Vec<u8>, DeviceError> {
        let read_perf = logwise::perfwarn_begin!("WgpuDevice::read_aligned");
        let len = aligned.end - aligned.start;
        let readback = self
            .scoped(|| {
                self.device.create_buffer(&BufferDescriptor {
                    label: Label::from("buffer_storage readback"),
                    size: len as u64,
                    usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .map_err(|reason| DeviceError::Allocation { size: len, reason })?;
        self.submit_copy("WgpuDevice::read_aligned", |encoder| {
            encoder.copy_buffer_to_buffer(source, aligned.start as u64, &readback, 0, len as u64);
        })?;
        let (sender, receiver) = std::sync::mpsc::channel();
        readback
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        self.wait()?;
        match receiver.recv() {
            Ok(result) => result?,
            Err(_) => return Err(DeviceError::Map("map callback was dropped".to_string())),
        }
        let view = readback.slice(..).get_mapped_range();
        let bytes: &[u8] = &view;
        let out = bytes.to_vec();
        drop(view);
        readback.unmap();
        readback.destroy();
        drop(read_perf);
        Ok(out)
    }
}

impl Device for WgpuDevice {
    type StagingBuffer = WgpuStagingBuffer;
    type DeviceBuffer = WgpuDeviceBuffer;

    fn create_staging_buffer(
        &self,
        size: usize,
        initial_data: Option<&[u8]>,
        debug_name: &str,
    ) -> Result<Self::StagingBuffer, DeviceError> {
        if initial_data.is_some_and(|data| data.len() > size) {
            return Err(DeviceError::Allocation {
                size,
                reason: "initial data does not fit".to_string(),
            });
        }
        let buffer = self
            .scoped(|| {
                let buffer = self.device.create_buffer(&BufferDescriptor {
                    label: Label::from(debug_name),
                    size: allocation_size(size) as u64,
                    usage: BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
                    mapped_at_creation: initial_data.is_some(),
                });
                if let Some(data) = initial_data {
                    let mut entire_map = buffer.slice(..).get_mapped_range_mut();
                    entire_map[..data.len()].copy_from_slice(data);
                    drop(entire_map);
                    buffer.unmap();
                }
                buffer
            })
            .map_err(|reason| DeviceError::Allocation { size, reason })?;
        Ok(WgpuStagingBuffer { buffer, size })
    }

    fn create_device_buffer(
        &self,
        size: usize,
        binding: BindingConfig,
        debug_name: &str,
    ) -> Result<Self::DeviceBuffer, DeviceError> {
        let buffer = self
            .scoped(|| {
                self.device.create_buffer(&BufferDescriptor {
                    label: Label::from(debug_name),
                    size: allocation_size(size) as u64,
                    usage: buffer_usages(binding),
                    mapped_at_creation: false,
                })
            })
            .map_err(|reason| DeviceError::Allocation { size, reason })?;
        Ok(WgpuDeviceBuffer {
            buffer,
            size,
            binding,
        })
    }

    fn map_read<R>(
        &self,
        buffer: &Self::StagingBuffer,
        range: Range<usize>,
        read: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, DeviceError> {
        check_range(&range, buffer.size).map_err(DeviceError::Map)?;
        if range.is_empty() {
            return Ok(read(&[]));
        }
        let aligned = aligned_range(&range);
        let bytes = self.read_aligned(&buffer.buffer, aligned.clone())?;
        let local = range.start - aligned.start;
        Ok(read(&bytes[local..local + range.len()]))
    }

    fn map_write<R>(
        &self,
        buffer: &mut Self::StagingBuffer,
        range: Range<usize>,
        write: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, DeviceError> {
        check_range(&range, buffer.size).map_err(DeviceError::Map)?;
        if range.is_empty() {
            return Ok(write(&mut []));
        }
        //read-modify-write so bytes outside `range` in the aligned span survive
        let aligned = aligned_range(&range);
        let mut scratch = self.read_aligned(&buffer.buffer, aligned.clone())?;
        let local = range.start - aligned.start;
        let result = write(&mut scratch[local..local + range.len()]);
        self.scoped(|| {
            self.queue
                .write_buffer(&buffer.buffer, aligned.start as u64, &scratch)
        })
        .map_err(DeviceError::Map)?;
        Ok(result)
    }

    fn copy_staging_region(
        &self,
        source: &Self::StagingBuffer,
        source_offset: usize,
        destination: &mut Self::StagingBuffer,
        destination_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError> {
        let source_range = source_offset..source_offset + len;
        let destination_range = destination_offset..destination_offset + len;
        check_range(&source_range, source.size).map_err(DeviceError::Copy)?;
        check_range(&destination_range, destination.size).map_err(DeviceError::Copy)?;
        if len == 0 {
            return Ok(());
        }
        if is_aligned(source_offset, ALIGNMENT)
            && is_aligned(destination_offset, ALIGNMENT)
            && is_aligned(len, ALIGNMENT)
        {
            return self.submit_copy("WgpuDevice::copy_staging_region", |encoder| {
                encoder.copy_buffer_to_buffer(
                    &source.buffer,
                    source_offset as u64,
                    &destination.buffer,
                    destination_offset as u64,
                    len as u64,
                );
            });
        }
        //unaligned copies go through the CPU
        let bytes = self.map_read(source, source_range, |bytes| bytes.to_vec())?;
        self.map_write(destination, destination_range, |mapped| {
            mapped.copy_from_slice(&bytes)
        })
    }

    fn copy_to_device_buffer(
        &self,
        source: &Self::StagingBuffer,
        source_offset: usize,
        destination: &mut Self::DeviceBuffer,
        destination_offset: usize,
        len: usize,
    ) -> Result<(), DeviceError> {
        if len == 0 {
            return Ok(());
        }
        if !is_aligned(source_offset, ALIGNMENT) || !is_aligned(destination_offset, ALIGNMENT) {
            return Err(DeviceError::Copy(format!(
                "device buffer copies must start on a {ALIGNMENT} byte boundary"
            )));
        }
        //device buffers can't be mapped, so pad the copy instead; the padding lands past the content
        let padded = align_up(len, ALIGNMENT);
        if source_offset + padded > source.allocated()
            || destination_offset + padded > destination.allocated()
        {
            return Err(DeviceError::Copy(format!(
                "copy of {len} bytes out of bounds"
            )));
        }
        self.submit_copy("WgpuDevice::copy_to_device_buffer", |encoder| {
            encoder.copy_buffer_to_buffer(
                &source.buffer,
                source_offset as u64,
                &destination.buffer,
                destination_offset as u64,
                padded as u64,
            );
        })
    }
}
