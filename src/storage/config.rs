// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Builder for [`BufferStorage`](super::BufferStorage) options.

/// Bind cycles without a CPU read after which the resolved mirror is freed.
pub const DEFAULT_EVICTION_THRESHOLD: u32 = 5;

/// Options for creating a [`BufferStorage`](super::BufferStorage).
///
/// ```
/// use buffer_storage::storage::StorageConfig;
///
/// let config = StorageConfig::new("terrain vertices").with_eviction_threshold(10);
/// assert_eq!(config.eviction_threshold(), 10);
/// assert_eq!(config.debug_name(), "terrain vertices");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    debug_name: String,
    eviction_threshold: u32,
}

impl StorageConfig {
    /// Create a config with the given debug name and default options.
    pub fn new(debug_name: &str) -> Self {
        Self {
            debug_name: debug_name.to_string(),
            eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
        }
    }

    /// Set the number of read-less bind cycles after which the resolved mirror is freed.
    pub fn with_eviction_threshold(mut self, eviction_threshold: u32) -> Self {
        self.eviction_threshold = eviction_threshold;
        self
    }

    /// The label passed to the device for every resource this storage creates.
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn eviction_threshold(&self) -> u32 {
        self.eviction_threshold
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new("BufferStorage")
    }
}
