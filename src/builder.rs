//! Cache configuration and builder.
//!
//! Configuration is deliberately small: capacity, policy, maximum key length,
//! and how long a miss waits for a concurrent fetch of the same key.
//!
//! ## Example
//!
//! ```rust
//! use pincache::builder::CacheBuilder;
//! use pincache::policy::PolicyKind;
//! use pincache::reader::MemoryReader;
//!
//! let reader = MemoryReader::new();
//! reader.insert("a.bmp", vec![0u8; 64]);
//!
//! let cache = CacheBuilder::new(4096)
//!     .policy(PolicyKind::Fifo)
//!     .max_key_len(256)
//!     .build(reader)
//!     .unwrap();
//!
//! let mut buf = [0u8; 128];
//! let (n, outcome) = cache.get("a.bmp", &mut buf).unwrap();
//! assert_eq!(n, 64);
//! assert!(outcome.is_miss());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::FileCache;
use crate::error::{ConfigError, Result};
use crate::policy::PolicyKind;
use crate::reader::StorageReader;

/// Default maximum key length in bytes (Linux `PATH_MAX`).
pub const DEFAULT_MAX_KEY_LEN: usize = 4096;

/// Default bound on waiting for another caller's fetch of the same key.
pub const DEFAULT_INFLIGHT_WAIT_MS: u64 = 1_000;

const DEFAULT_CAPACITY: usize = 64 * 1024 * 1024;

/// Everything needed to initialize a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Pinned bytes available to cached items.
    pub capacity: usize,
    pub policy: PolicyKind,
    /// Longest accepted key, in bytes.
    pub max_key_len: usize,
    /// How long a miss waits for a concurrent fetch of the same key before
    /// reading on its own.
    pub inflight_wait_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            policy: PolicyKind::default(),
            max_key_len: DEFAULT_MAX_KEY_LEN,
            inflight_wait_ms: DEFAULT_INFLIGHT_WAIT_MS,
        }
    }
}

impl CacheConfig {
    pub fn new(capacity: usize, policy: PolicyKind) -> Self {
        Self {
            capacity,
            policy,
            ..Self::default()
        }
    }

    pub fn inflight_wait(&self) -> Duration {
        Duration::from_millis(self.inflight_wait_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::new("capacity must be > 0"));
        }
        if self.max_key_len == 0 {
            return Err(ConfigError::new("max_key_len must be > 0"));
        }
        Ok(())
    }
}

/// Fluent construction of a ready [`FileCache`].
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    config: CacheConfig,
}

impl CacheBuilder {
    /// Starts from the defaults with the given capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            config: CacheConfig {
                capacity,
                ..CacheConfig::default()
            },
        }
    }

    pub fn from_config(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn max_key_len(mut self, max_key_len: usize) -> Self {
        self.config.max_key_len = max_key_len;
        self
    }

    pub fn inflight_wait(mut self, wait: Duration) -> Self {
        self.config.inflight_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Allocates and pins the arena. Fails like [`FileCache::init`].
    pub fn build<R>(self, reader: R) -> Result<FileCache>
    where
        R: StorageReader + 'static,
    {
        FileCache::open(self.config, reader)
    }
}
