use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::error::CacheError;

/// A bounded-length cache key, usually a file path.
///
/// Keys are never truncated: a key longer than the configured maximum is
/// rejected, since truncation would make distinct paths collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn new(key: &str, max_len: usize) -> Result<Self, CacheError> {
        check_len(key, max_len)?;
        Ok(Self(Arc::from(key)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rejects keys over `max_len` bytes without allocating.
pub(crate) fn check_len(key: &str, max_len: usize) -> Result<(), CacheError> {
    if key.len() > max_len {
        return Err(CacheError::KeyTooLong {
            len: key.len(),
            max: max_len,
        });
    }
    Ok(())
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
