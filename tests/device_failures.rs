//! Device failures surface as `ResourceExhausted` and leave the storage as it was.

use buffer_storage::device::DeviceError;
use buffer_storage::imp::software::{Fault, SoftwareDevice};
use buffer_storage::{BufferStorage, BufferUsage, Error, StorageConfig};
use std::sync::Arc;

fn storage(name: &str) -> (Arc<SoftwareDevice>, BufferStorage<SoftwareDevice>) {
    let device = Arc::new(SoftwareDevice::new());
    let mut storage = BufferStorage::new(device.clone(), StorageConfig::new(name));
    storage.write(b"ABCD", 0).unwrap();
    (device, storage)
}

#[test]
fn failed_growth_changes_nothing() {
    let (device, mut storage) = storage("failed_growth");
    storage.device_buffer_for(BufferUsage::VertexBuffer).unwrap();
    let serial = storage.serial();
    device.set_fault(Fault::Allocation, true);

    let err = storage.write(b"EFGH", 4).unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceExhausted(DeviceError::Allocation { size: 8, .. })
    ));
    device.set_fault(Fault::Allocation, false);

    assert_eq!(storage.size(), 4);
    assert_eq!(storage.staging_capacity(), 4);
    assert_eq!(storage.read().unwrap(), b"ABCD");
    //pool was not dirtied by the failed write
    assert_eq!(storage.is_direct_buffer_dirty(BufferUsage::VertexBuffer), Some(false));
    assert_eq!(storage.serial(), serial);
}

#[test]
fn failed_map_keeps_content_and_mirror() {
    let (device, mut storage) = storage("failed_map");
    assert_eq!(storage.read().unwrap(), b"ABCD");
    device.set_fault(Fault::Map, true);

    assert!(storage.write(b"XY", 1).is_err());
    assert!(storage.is_resolved_valid());
    //served from the mirror, so no map is needed
    assert_eq!(storage.read().unwrap(), b"ABCD");
    device.set_fault(Fault::Map, false);
    assert_eq!(storage.size(), 4);
}

#[test]
fn failed_map_after_reallocation_keeps_old_resource() {
    let (device, mut storage) = storage("failed_map_realloc");
    device.set_fault(Fault::Map, true);
    assert!(storage.write(b"EF", 6).is_err());
    device.set_fault(Fault::Map, false);

    assert_eq!(storage.size(), 4);
    assert_eq!(storage.staging_capacity(), 4);
    let stats = device.stats();
    assert_eq!(stats.live_staging_buffers, 1);
    assert_eq!(stats.live_bytes, 4);
    assert_eq!(storage.read().unwrap(), b"ABCD");
}

#[test]
fn failed_read_is_reported() {
    let (device, mut storage) = storage("failed_read");
    device.set_fault(Fault::Map, true);
    assert!(matches!(
        storage.read(),
        Err(Error::ResourceExhausted(DeviceError::Map(_)))
    ));
    assert!(!storage.is_resolved_valid());
    device.set_fault(Fault::Map, false);
    assert_eq!(storage.read().unwrap(), b"ABCD");
}

#[test]
fn failed_bind_leaves_pool_empty() {
    let (device, mut storage) = storage("failed_bind");
    let serial = storage.serial();
    device.set_fault(Fault::Copy, true);
    assert!(storage.device_buffer_for(BufferUsage::Index).is_err());
    device.set_fault(Fault::Copy, false);

    assert_eq!(storage.direct_buffer_count(), 0);
    assert_eq!(storage.serial(), serial);
    assert_eq!(device.stats().live_device_buffers, 0);

    let buffer = storage.device_buffer_for(BufferUsage::Index).unwrap();
    assert_eq!(buffer.contents(), b"ABCD");
}

#[test]
fn failed_refresh_stays_dirty() {
    let (device, mut storage) = storage("failed_refresh");
    storage.device_buffer_for(BufferUsage::VertexBuffer).unwrap();
    storage.write(b"Z", 0).unwrap();
    device.set_fault(Fault::Copy, true);
    assert!(storage.device_buffer_for(BufferUsage::VertexBuffer).is_err());
    device.set_fault(Fault::Copy, false);

    assert_eq!(storage.is_direct_buffer_dirty(BufferUsage::VertexBuffer), Some(true));
    let buffer = storage.device_buffer_for(BufferUsage::VertexBuffer).unwrap();
    assert_eq!(buffer.contents(), b"ZBCD");
}

#[test]
fn drop_releases_everything() {
    let device = Arc::new(SoftwareDevice::new());
    {
        let mut storage = BufferStorage::new(device.clone(), StorageConfig::new("drop"));
        storage.write(&[9; 100], 0).unwrap();
        storage.write(&[8; 50], 100).unwrap();
        for usage in BufferUsage::ALL {
            storage.device_buffer_for(usage).unwrap();
        }
        storage.read().unwrap();
        assert!(device.stats().live_bytes > 0);
    }
    let stats = device.stats();
    assert_eq!(stats.live_bytes, 0);
    assert_eq!(stats.live_staging_buffers, 0);
    assert_eq!(stats.live_device_buffers, 0);
}

#[test]
fn unrepresentable_size_is_reported() {
    let (device, mut storage) = storage("unrepresentable");
    let err = storage.reserve(usize::MAX / 2, 4).unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceExhausted(DeviceError::Allocation { .. })
    ));
    assert_eq!(storage.size(), 4);
    assert_eq!(storage.staging_capacity(), 4);
    assert_eq!(device.stats().live_staging_buffers, 1);
    assert_eq!(storage.read().unwrap(), b"ABCD");
}

#[test]
fn failed_prefix_copy_changes_nothing() {
    let (device, mut storage) = storage("failed_prefix_copy");
    assert_eq!(storage.read().unwrap(), b"ABCD");
    storage.device_buffer_for(BufferUsage::VertexBuffer).unwrap();
    device.set_fault(Fault::Copy, true);

    //growing past capacity copies the prefix into the new resource first
    let err = storage.write(b"zz", 6).unwrap_err();
    assert!(matches!(err, Error::ResourceExhausted(DeviceError::Copy(_))));
    device.set_fault(Fault::Copy, false);

    assert_eq!(storage.size(), 4);
    assert_eq!(storage.staging_capacity(), 4);
    assert!(storage.is_resolved_valid());
    assert_eq!(storage.is_direct_buffer_dirty(BufferUsage::VertexBuffer), Some(false));
    assert_eq!(device.stats().live_staging_buffers, 1);
    assert_eq!(storage.read().unwrap(), b"ABCD");
}

#[test]
fn failed_copy_from_changes_nothing() {
    let device = Arc::new(SoftwareDevice::new());
    let mut source = BufferStorage::new(device.clone(), StorageConfig::new("source"));
    let mut destination = BufferStorage::new(device.clone(), StorageConfig::new("destination"));
    source.write(b"01234567", 0).unwrap();
    destination.write(b"abcd", 0).unwrap();
    assert_eq!(destination.read().unwrap(), b"abcd");
    destination.device_buffer_for(BufferUsage::Index).unwrap();
    device.set_fault(Fault::Copy, true);

    //in place, then growing
    assert!(destination.copy_from(&source, 2, 0, 1).is_err());
    assert!(matches!(
        destination.copy_from(&source, 6, 0, 2),
        Err(Error::ResourceExhausted(DeviceError::Copy(_)))
    ));
    device.set_fault(Fault::Copy, false);

    assert_eq!(destination.size(), 4);
    assert_eq!(destination.staging_capacity(), 4);
    assert!(destination.is_resolved_valid());
    assert_eq!(destination.is_direct_buffer_dirty(BufferUsage::Index), Some(false));
    assert_eq!(device.stats().live_staging_buffers, 2);
    assert_eq!(destination.read().unwrap(), b"abcd");
    assert_eq!(source.read().unwrap(), b"01234567");
}
