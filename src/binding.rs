//! Object-style handle for embedding the cache in a host runtime.
//!
//! [`CacheObject`] ties the cache lifecycle to a value: constructing it
//! initializes the cache, dropping it releases the pinned region. Lookups
//! return owned bytes sized to the item, so hosts never manage buffers.
//!
//! ```no_run
//! use pincache::binding::CacheObject;
//!
//! let cache = CacheObject::new(16 * 1024 * 1024).unwrap();
//! let bytes = cache.get("/data/images/0001.bmp").unwrap();
//! println!("{} bytes", bytes.len());
//! ```

use crate::builder::CacheConfig;
use crate::cache::FileCache;
use crate::error::Result;
use crate::metrics::CacheMetricsSnapshot;
use crate::policy::PolicyKind;
use crate::reader::{FsReader, StorageReader};

#[derive(Debug)]
pub struct CacheObject {
    cache: FileCache,
}

impl CacheObject {
    /// A cost-aware cache of `capacity` bytes over the local filesystem.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_reader(CacheConfig::new(capacity, PolicyKind::CostAware), FsReader::new())
    }

    pub fn with_reader<R>(config: CacheConfig, reader: R) -> Result<Self>
    where
        R: StorageReader + 'static,
    {
        Ok(Self {
            cache: FileCache::open(config, reader)?,
        })
    }

    /// Returns the whole item stored under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.cache
            .get_owned(key, usize::MAX)
            .map(|(bytes, _)| bytes)
    }

    pub fn capacity(&self) -> usize {
        // 0 once destroyed through `cache()`.
        self.cache.capacity().unwrap_or(0)
    }

    pub fn metrics(&self) -> Result<CacheMetricsSnapshot> {
        self.cache.metrics()
    }

    /// The underlying façade, for callers that want hit/miss outcomes.
    pub fn cache(&self) -> &FileCache {
        &self.cache
    }
}

impl Drop for CacheObject {
    fn drop(&mut self) {
        // Already destroyed is not an error at teardown.
        let _ = self.cache.destroy();
    }
}
