// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::device::DeviceError;

/// Failure to set up a [`WgpuDevice`](super::WgpuDevice).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No such adapter: {0}")]
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    #[error(transparent)]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
}

impl From<wgpu::BufferAsyncError> for DeviceError {
    fn from(err: wgpu::BufferAsyncError) -> Self {
        DeviceError::Map(err.to_string())
    }
}

impl From<wgpu::PollError> for DeviceError {
    fn from(err: wgpu::PollError) -> Self {
        DeviceError::Map(format!("device poll failed: {err}"))
    }
}
