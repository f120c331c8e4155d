//! Storage readers: where cache misses get their bytes.
//!
//! The cache depends on storage only through [`StorageReader`]. Two
//! implementations ship with the crate:
//!
//! - [`FsReader`]: reads files with `O_DIRECT`, bypassing the OS page cache
//!   so that hit/miss timings measure this cache and not a hidden one.
//! - [`MemoryReader`]: serves blobs from memory, counts invocations and can
//!   inject latency or failures. Used by tests and benchmarks.

pub mod fs;
pub mod memory;

use crate::error::ReadError;

pub use fs::FsReader;
pub use memory::{FailureKind, MemoryReader};

/// An uncached, byte-addressable source of items.
pub trait StorageReader: Send + Sync {
    /// Reads the whole item stored under `key`.
    ///
    /// If the item is larger than `max_size`, returns
    /// [`ReadError::TooLarge`] carrying the true size, without reading the
    /// payload. The returned vector's length is the item's actual size.
    fn read_exact(&self, key: &str, max_size: usize) -> Result<Vec<u8>, ReadError>;
}

impl<R: StorageReader + ?Sized> StorageReader for std::sync::Arc<R> {
    fn read_exact(&self, key: &str, max_size: usize) -> Result<Vec<u8>, ReadError> {
        (**self).read_exact(key, max_size)
    }
}

impl<R: StorageReader + ?Sized> StorageReader for Box<R> {
    fn read_exact(&self, key: &str, max_size: usize) -> Result<Vec<u8>, ReadError> {
        (**self).read_exact(key, max_size)
    }
}
