//! A fixed-size byte region locked into physical memory.
//!
//! The region is one anonymous private mapping, locked with `mlock(2)` right
//! after it is created. It is never resized; dropping it unlocks and unmaps
//! the pages.

use std::fmt;
use std::io;

use memmap2::MmapMut;
use tracing::{debug, info};

use crate::error::CacheError;

pub struct PinnedRegion {
    map: MmapMut,
    len: usize,
}

impl PinnedRegion {
    /// Maps and pins `len` bytes.
    ///
    /// Fails with [`CacheError::OutOfMemory`] if the mapping cannot be created
    /// and [`CacheError::PinFailed`] if it cannot be locked. A region is never
    /// handed out unpinned.
    pub fn new(len: usize) -> Result<Self, CacheError> {
        let mut map = MmapMut::map_anon(len).map_err(|source| CacheError::OutOfMemory {
            capacity: len,
            source,
        })?;
        lock(&mut map).map_err(|source| CacheError::PinFailed {
            capacity: len,
            source,
        })?;
        info!(bytes = len, "pinned cache region");
        Ok(Self { map, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map[..self.len]
    }
}

#[cfg(unix)]
fn lock(map: &mut MmapMut) -> io::Result<()> {
    map.lock()
}

#[cfg(not(unix))]
fn lock(_map: &mut MmapMut) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "memory pinning is only supported on unix",
    ))
}

impl Drop for PinnedRegion {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Err(err) = self.map.unlock() {
            debug!(error = %err, "munlock failed, unmapping anyway");
        }
        info!(bytes = self.len, "released cache region");
    }
}

impl fmt::Debug for PinnedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedRegion").field("len", &self.len).finish()
    }
}
