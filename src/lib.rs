/*! buffer_storage keeps a GPU buffer's bytes in a CPU-visible staging resource and hands out
device-local copies of them on demand.

It is the storage layer under a translation layer such as a GL-on-native renderer, where client
code writes buffer data whenever it likes, reads it back occasionally, and binds the same
buffer for several purposes.  Rather than keeping every representation current all the time,
each one is brought up to date lazily, only when something asks for it:

| Representation   | Lives in        | Brought up to date             | Freed                                    |
|------------------|-----------------|--------------------------------|------------------------------------------|
| Staging resource | CPU-visible     | On every write                 | When the storage is dropped              |
| Resolved mirror  | Host memory     | On the first read after a write | After too many bind cycles with no read |
| Direct buffers   | GPU-local       | On the first bind after a write | When the storage is dropped              |

The entry point is [BufferStorage].  It is generic over a [device::Device], which abstracts the
handful of buffer operations a graphics API must provide: create, map and copy.

# Backends

[imp::software::SoftwareDevice] keeps everything in host memory.  It works anywhere, and since it
counts every call and can be told to fail, it is what the test suite runs against.

With the `backend_wgpu` feature, `imp::wgpu::WgpuDevice` runs the same operations against a
[wgpu](https://wgpu.rs) device, so we inherit its support for DX12, Vulkan, Metal, WebGPU, etc.

# Example

```
use buffer_storage::{BufferStorage, BufferUsage, StorageConfig};
use buffer_storage::imp::software::SoftwareDevice;
use std::sync::Arc;

let device = Arc::new(SoftwareDevice::new());
let mut indices = BufferStorage::new(device, StorageConfig::new("indices"));
indices.write(&[0, 1, 2, 2, 1, 3], 0)?;
let serial = indices.serial();
let bound = indices.device_buffer_for(BufferUsage::Index)?;
assert_eq!(bound.contents(), &[0, 1, 2, 2, 1, 3]);
assert_ne!(indices.serial(), serial);
# Ok::<(), buffer_storage::Error>(())
```
*/

mod bittricks;
pub mod device;
pub mod imp;
pub mod storage;

pub use storage::visible_to::BufferUsage;
pub use storage::{BufferStorage, Error, StorageConfig};
