//! Write, read and copy behavior of the staging store, observed through [BufferStorage].

use buffer_storage::imp::software::SoftwareDevice;
use buffer_storage::{BufferStorage, StorageConfig};
use std::sync::Arc;

fn storage(name: &str) -> (Arc<SoftwareDevice>, BufferStorage<SoftwareDevice>) {
    let device = Arc::new(SoftwareDevice::new());
    let storage = BufferStorage::new(device.clone(), StorageConfig::new(name));
    (device, storage)
}

#[test]
fn overwrite_in_place() {
    let (device, mut storage) = storage("overwrite_in_place");
    storage.write(b"ABCD", 0).unwrap();
    storage.write(b"XY", 1).unwrap();
    assert_eq!(storage.size(), 4);
    assert_eq!(storage.read().unwrap(), b"AXYD");

    let stats = device.stats();
    //first write initializes the new resource directly; the second maps it
    assert_eq!(stats.staging_buffers_created, 1);
    assert_eq!(stats.map_writes, 1);
    assert_eq!(storage.staging_capacity(), 4);
}

#[test]
fn growth_preserves_prefix() {
    let (device, mut storage) = storage("growth_preserves_prefix");
    storage.write(b"ABCD", 0).unwrap();
    storage.write(b"EF", 6).unwrap();
    assert_eq!(storage.size(), 8);
    assert_eq!(storage.staging_capacity(), 8);

    let content = storage.read().unwrap();
    assert_eq!(&content[..4], b"ABCD");
    assert_eq!(&content[6..], b"EF");

    let stats = device.stats();
    assert_eq!(stats.staging_buffers_created, 2);
    assert_eq!(stats.staging_copies, 1);
    //the replaced resource was released
    assert_eq!(stats.live_staging_buffers, 1);
}

#[test]
fn growth_from_offset_zero_skips_prefix_copy() {
    let (device, mut storage) = storage("growth_from_offset_zero");
    storage.write(b"AB", 0).unwrap();
    storage.write(b"0123456789", 0).unwrap();
    assert_eq!(storage.read().unwrap(), b"0123456789");
    assert_eq!(device.stats().staging_copies, 0);
    assert_eq!(device.stats().map_writes, 0);
}

#[test]
fn short_write_keeps_size() {
    let (_device, mut storage) = storage("short_write_keeps_size");
    storage.write(b"ABCDEFGH", 0).unwrap();
    storage.write(b"Z", 0).unwrap();
    assert_eq!(storage.size(), 8);
    assert_eq!(storage.read().unwrap(), b"ZBCDEFGH");
}

#[test]
fn read_after_write_sees_new_bytes() {
    let (device, mut storage) = storage("read_after_write");
    storage.write(b"one", 0).unwrap();
    assert_eq!(storage.read().unwrap(), b"one");
    assert!(storage.is_resolved_valid());
    storage.write(b"two", 0).unwrap();
    assert!(!storage.is_resolved_valid());
    assert!(storage.has_resolved_mirror());
    assert_eq!(storage.read().unwrap(), b"two");
    assert_eq!(device.stats().map_reads, 2);
}

#[test]
fn empty_storage_reads_empty() {
    let (device, mut storage) = storage("empty");
    assert_eq!(storage.size(), 0);
    assert!(storage.read().unwrap().is_empty());
    assert_eq!(device.stats().staging_buffers_created, 0);
}

#[test]
fn clear_is_idempotent_and_keeps_capacity() {
    let (device, mut storage) = storage("clear");
    storage.write(b"ABCDEF", 0).unwrap();
    storage.clear();
    storage.clear();
    assert_eq!(storage.size(), 0);
    assert_eq!(storage.staging_capacity(), 6);
    assert!(storage.read().unwrap().is_empty());

    //the next write reuses the resource
    storage.write(b"GH", 0).unwrap();
    assert_eq!(storage.size(), 2);
    assert_eq!(storage.read().unwrap(), b"GH");
    assert_eq!(device.stats().staging_buffers_created, 1);
}

#[test]
fn reserve_grows_without_data() {
    let (device, mut storage) = storage("reserve");
    storage.write(b"AB", 0).unwrap();
    storage.reserve(4, 2).unwrap();
    assert_eq!(storage.size(), 6);
    assert_eq!(&storage.read().unwrap()[..2], b"AB");
    //prefix copy, but nothing to map
    assert_eq!(device.stats().map_writes, 0);
    assert_eq!(device.stats().staging_copies, 1);
}

#[test]
fn copy_between_storages() {
    let device = Arc::new(SoftwareDevice::new());
    let mut source = BufferStorage::new(device.clone(), StorageConfig::new("source"));
    let mut destination = BufferStorage::new(device.clone(), StorageConfig::new("destination"));
    source.write(b"0123456789", 0).unwrap();
    destination.write(b"abcd", 0).unwrap();
    assert_eq!(destination.read().unwrap(), b"abcd");

    destination.copy_from(&source, 3, 5, 2).unwrap();
    assert_eq!(destination.size(), 5);
    assert_eq!(destination.read().unwrap(), b"ab567");
    //source is untouched
    assert_eq!(source.read().unwrap(), b"0123456789");
}

#[test]
fn zero_length_copy_is_a_no_op() {
    let device = Arc::new(SoftwareDevice::new());
    let source = BufferStorage::new(device.clone(), StorageConfig::new("source"));
    let mut destination = BufferStorage::new(device.clone(), StorageConfig::new("destination"));
    destination.copy_from(&source, 0, 0, 0).unwrap();
    assert_eq!(destination.size(), 0);
    assert_eq!(device.stats().staging_copies, 0);
}

#[test]
fn copy_past_source_content_is_an_error() {
    let device = Arc::new(SoftwareDevice::new());
    let mut source = BufferStorage::new(device.clone(), StorageConfig::new("source"));
    let mut destination = BufferStorage::new(device.clone(), StorageConfig::new("destination"));
    source.write(b"abc", 0).unwrap();
    destination.write(b"xy", 0).unwrap();
    assert!(destination.read().is_ok());

    assert!(destination.copy_from(&source, 4, 0, 0).is_err());
    //empty source
    let empty = BufferStorage::new(device.clone(), StorageConfig::new("empty"));
    assert!(destination.copy_from(&empty, 1, 0, 0).is_err());

    assert_eq!(destination.size(), 2);
    assert!(destination.is_resolved_valid());
    assert_eq!(destination.read().unwrap(), b"xy");
    assert_eq!(device.stats().staging_copies, 0);
}
