// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The resolved-data cache: a CPU mirror of the staging content.

Reading staging memory means a map/copy/unmap round trip through the driver, so the
first read after a write copies the whole content into a host-side `Vec` and later reads
are served from it.  Writes only invalidate the mirror; the allocation is kept.

Buffers that are written and bound every frame but rarely read back would hold their
mirror forever.  Each bind cycle advances a read counter that reads reset, and once the
counter passes the eviction threshold the mirror is freed.  The staging buffer itself is
never evicted.
*/

use super::staging::StagingStore;
use crate::device::{Device, DeviceError};

#[derive(Debug)]
pub(crate) struct ResolvedDataCache {
    mirror: Option<Vec<u8>>,
    valid: bool,
    read_usage_count: u32,
    write_usage_count: u32,
    eviction_threshold: u32,
}

impl ResolvedDataCache {
    pub(crate) fn new(eviction_threshold: u32) -> Self {
        ResolvedDataCache {
            mirror: None,
            valid: false,
            read_usage_count: 0,
            write_usage_count: 0,
            eviction_threshold,
        }
    }

    /// Called after every successful write.
    pub(crate) fn invalidate_for_write(&mut self) {
        self.valid = false;
        self.write_usage_count = 0;
    }

    /// Called on clear.  Usage counters are left alone.
    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    /**
    Returns the first `store.size()` bytes of content, reading staging back if the mirror is stale.

    The mirror is (re)allocated to the staging capacity when it is missing or smaller.
    */
    pub(crate) fn resolve<D: Device>(&mut self, store: &StagingStore<D>) -> Result<&[u8], DeviceError> {
        let size = store.size();
        if !self.valid {
            let resolve_perf = logwise::perfwarn_begin!("ResolvedDataCache::resolve");
            let mirror = self.mirror.get_or_insert_with(Vec::new);
            if mirror.len() < store.capacity() {
                *mirror = vec![0; store.capacity()];
            }
            if let Err(err) = store.read_into(&mut mirror[..size]) {
                logwise::warn_sync!(
                    "Could not read back staging content: {err}",
                    err = logwise::privacy::LogIt(&err)
                );
                return Err(err);
            }
            self.valid = true;
            drop(resolve_perf);
        }
        self.read_usage_count = 0;
        match &self.mirror {
            Some(mirror) => Ok(&mirror[..size]),
            None => Ok(&[]),
        }
    }

    /**
    Advances both usage counters by one bind cycle, evicting the mirror past the threshold.

    Returns whether the mirror was evicted.
    */
    pub(crate) fn mark_usage(&mut self) -> bool {
        self.read_usage_count = self.read_usage_count.saturating_add(1);
        self.write_usage_count = self.write_usage_count.saturating_add(1);
        if self.read_usage_count > self.eviction_threshold && self.mirror.is_some() {
            self.mirror = None;
            self.valid = false;
            return true;
        }
        false
    }

    pub(crate) fn has_mirror(&self) -> bool {
        self.mirror.is_some()
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn read_usage_count(&self) -> u32 {
        self.read_usage_count
    }

    pub(crate) fn write_usage_count(&self) -> u32 {
        self.write_usage_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::software::SoftwareDevice;
    use std::sync::Arc;

    #[test]
    fn second_read_hits_mirror() {
        let device = Arc::new(SoftwareDevice::new());
        let mut store = StagingStore::new(device.clone(), "test");
        store.write(Some(b"hello"), 5, 0).unwrap();
        let mut cache = ResolvedDataCache::new(5);
        assert_eq!(cache.resolve(&store).unwrap(), b"hello");
        assert_eq!(cache.resolve(&store).unwrap(), b"hello");
        assert_eq!(device.stats().map_reads, 1);
    }

    #[test]
    fn invalidated_mirror_keeps_allocation() {
        let device = Arc::new(SoftwareDevice::new());
        let mut store = StagingStore::new(device.clone(), "test");
        store.write(Some(b"hello"), 5, 0).unwrap();
        let mut cache = ResolvedDataCache::new(5);
        cache.resolve(&store).unwrap();
        cache.invalidate_for_write();
        assert!(cache.has_mirror());
        assert!(!cache.is_valid());
        store.write(Some(b"J"), 1, 0).unwrap();
        assert_eq!(cache.resolve(&store).unwrap(), b"Jello");
        assert_eq!(device.stats().map_reads, 2);
    }

    #[test]
    fn evicts_after_threshold() {
        let device = Arc::new(SoftwareDevice::new());
        let mut store = StagingStore::new(device, "test");
        store.write(Some(b"abc"), 3, 0).unwrap();
        let mut cache = ResolvedDataCache::new(2);
        cache.resolve(&store).unwrap();
        assert!(!cache.mark_usage());
        assert!(!cache.mark_usage());
        assert!(cache.mark_usage());
        assert!(!cache.has_mirror());
        assert!(!cache.is_valid());
        //nothing left to evict
        assert!(!cache.mark_usage());
    }

    #[test]
    fn empty_store_resolves_to_nothing() {
        let device = Arc::new(SoftwareDevice::new());
        let store = StagingStore::new(device.clone(), "test");
        let mut cache = ResolvedDataCache::new(5);
        assert!(cache.resolve(&store).unwrap().is_empty());
        assert_eq!(device.stats().map_reads, 0);
    }
}
