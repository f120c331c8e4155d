//! Error types for the pincache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Everything [`FileCache`](crate::cache::FileCache) can
//!   surface to a caller.
//! - [`ReadError`]: Failures reported by a
//!   [`StorageReader`](crate::reader::StorageReader).
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. zero capacity).
//! - [`InvariantError`]: Returned by `check_invariants` when the arena and the
//!   index disagree.
//!
//! Admission failures are a separate, crate-private type: caching is
//! best-effort, so they are logged and counted but never returned.
//!
//! ## Example Usage
//!
//! ```
//! use pincache::builder::CacheConfig;
//! use pincache::error::ConfigError;
//!
//! let bad = CacheConfig { capacity: 0, ..CacheConfig::default() };
//! let err: ConfigError = bad.validate().unwrap_err();
//! assert!(err.to_string().contains("capacity"));
//! ```

use std::io;

use thiserror::Error;

/// Result alias for façade operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the cache façade.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing region could not be reserved.
    #[error("failed to allocate {capacity} bytes for the cache region")]
    OutOfMemory {
        capacity: usize,
        #[source]
        source: io::Error,
    },

    /// The backing region was allocated but could not be locked into RAM.
    #[error("failed to pin {capacity} bytes of cache memory (check RLIMIT_MEMLOCK)")]
    PinFailed {
        capacity: usize,
        #[source]
        source: io::Error,
    },

    /// The handle was never initialized or has been destroyed.
    #[error("cache is not initialized")]
    NotInitialized,

    /// `init` was called on a handle that is already ready.
    #[error("cache is already initialized")]
    AlreadyInitialized,

    /// The key is longer than the configured maximum.
    #[error("key is {len} bytes, maximum is {max}")]
    KeyTooLong { len: usize, max: usize },

    /// The item read from storage does not fit the caller's buffer.
    #[error("item of {size} bytes does not fit a {capacity}-byte buffer")]
    ItemTooLarge { size: usize, capacity: usize },

    /// The resident entry does not fit the caller's buffer.
    #[error("cached entry of {size} bytes does not fit a {capacity}-byte buffer")]
    BufferTooSmall { size: usize, capacity: usize },

    /// The storage reader failed.
    #[error(transparent)]
    Storage(#[from] ReadError),

    #[error("invalid cache configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Failures reported by a storage reader.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("item not found: {0}")]
    NotFound(String),

    /// The item exists but is larger than the requested maximum. `size` is the
    /// item's true size.
    #[error("item is {size} bytes, read limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("i/o error reading {key}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("read of {0} was cancelled")]
    Cancelled(String),

    #[error("read of {0} timed out")]
    TimedOut(String),
}

/// Why an item was not admitted. Never leaves the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum AdmissionError {
    #[error("item of {size} bytes exceeds cache capacity {capacity}")]
    Uncacheable { size: usize, capacity: usize },

    #[error("no room for {size} bytes after eviction")]
    NoSpaceAfterEviction { size: usize },

    #[error("key is already resident")]
    DuplicateKey,

    #[error("key is {len} bytes, maximum is {max}")]
    KeyTooLong { len: usize, max: usize },
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by [`FileCache::check_invariants`](crate::cache::FileCache::check_invariants).
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheConfig::validate`](crate::builder::CacheConfig::validate)
/// and therefore by every constructor that accepts a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("used bytes mismatch");
        assert_eq!(err.to_string(), "used bytes mismatch");
        assert_eq!(err.message(), "used bytes mismatch");
    }

    #[test]
    fn config_error_wraps_into_cache_error() {
        let err: CacheError = ConfigError::new("capacity must be > 0").into();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
        assert_eq!(
            err.to_string(),
            "invalid cache configuration: capacity must be > 0"
        );
    }

    #[test]
    fn read_error_is_transparent() {
        let err: CacheError = ReadError::NotFound("a.bmp".into()).into();
        assert_eq!(err.to_string(), "item not found: a.bmp");
    }

    #[test]
    fn pin_failure_keeps_source() {
        use std::error::Error as _;

        let err = CacheError::PinFailed {
            capacity: 4096,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("4096"));
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<CacheError>();
        assert_error::<ReadError>();
        assert_error::<ConfigError>();
        assert_error::<InvariantError>();
    }
}
