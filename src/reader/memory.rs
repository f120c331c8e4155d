//! In-memory storage reader.
//!
//! Stands in for a filesystem in tests and benchmarks. Every call to
//! [`read_exact`](StorageReader::read_exact) is counted, per key and in
//! total, so callers can assert how often the cache went to storage.
//!
//! ## Example Usage
//!
//! ```
//! use pincache::reader::{MemoryReader, StorageReader};
//!
//! let reader = MemoryReader::new();
//! reader.insert("a.bmp", vec![1u8, 2, 3]);
//! assert_eq!(reader.read_exact("a.bmp", 16).unwrap(), vec![1, 2, 3]);
//! assert_eq!(reader.reads(), 1);
//! assert_eq!(reader.reads_of("a.bmp"), 1);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::ReadError;
use crate::reader::StorageReader;

#[derive(Debug, Clone)]
enum Blob {
    Bytes(Arc<[u8]>),
    /// Reads of this key fail with the given kind.
    Failing(FailureKind),
}

/// Injected failure for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Cancelled,
    TimedOut,
    Io,
}

#[derive(Debug, Default)]
pub struct MemoryReader {
    blobs: RwLock<FxHashMap<String, Blob>>,
    reads_by_key: RwLock<FxHashMap<String, u64>>,
    reads: AtomicU64,
    latency: RwLock<Option<Duration>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `latency` on every read, after counting it.
    pub fn with_latency(latency: Duration) -> Self {
        let reader = Self::new();
        reader.set_latency(Some(latency));
        reader
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.blobs.write().insert(key.into(), Blob::Bytes(bytes.into()));
    }

    /// Makes every read of `key` fail.
    pub fn fail(&self, key: impl Into<String>, kind: FailureKind) {
        self.blobs.write().insert(key.into(), Blob::Failing(kind));
    }

    pub fn remove(&self, key: &str) {
        self.blobs.write().remove(key);
    }

    /// Total `read_exact` invocations.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn reads_of(&self, key: &str) -> u64 {
        self.reads_by_key.read().get(key).copied().unwrap_or(0)
    }
}

impl StorageReader for MemoryReader {
    fn read_exact(&self, key: &str, max_size: usize) -> Result<Vec<u8>, ReadError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        *self.reads_by_key.write().entry(key.to_string()).or_default() += 1;

        let latency = *self.latency.read();
        if let Some(latency) = latency {
            thread::sleep(latency);
        }

        let blob = self.blobs.read().get(key).cloned();
        match blob {
            None => Err(ReadError::NotFound(key.to_string())),
            Some(Blob::Failing(FailureKind::Cancelled)) => Err(ReadError::Cancelled(key.to_string())),
            Some(Blob::Failing(FailureKind::TimedOut)) => Err(ReadError::TimedOut(key.to_string())),
            Some(Blob::Failing(FailureKind::Io)) => Err(ReadError::Io {
                key: key.to_string(),
                source: std::io::Error::other("injected failure"),
            }),
            Some(Blob::Bytes(bytes)) if bytes.len() > max_size => Err(ReadError::TooLarge {
                size: bytes.len(),
                max: max_size,
            }),
            Some(Blob::Bytes(bytes)) => Ok(bytes.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_read_including_failures() {
        let reader = MemoryReader::new();
        reader.insert("a", vec![1u8; 4]);
        reader.fail("b", FailureKind::Cancelled);

        assert!(reader.read_exact("a", 4).is_ok());
        assert!(matches!(reader.read_exact("a", 3), Err(ReadError::TooLarge { size: 4, max: 3 })));
        assert!(matches!(reader.read_exact("b", 4), Err(ReadError::Cancelled(_))));
        assert!(matches!(reader.read_exact("c", 4), Err(ReadError::NotFound(_))));

        assert_eq!(reader.reads(), 4);
        assert_eq!(reader.reads_of("a"), 2);
        assert_eq!(reader.reads_of("zzz"), 0);
    }

    #[test]
    fn remove_makes_key_missing() {
        let reader = MemoryReader::new();
        reader.insert("a", vec![1u8]);
        reader.remove("a");
        assert!(matches!(reader.read_exact("a", 4), Err(ReadError::NotFound(_))));
    }
}
