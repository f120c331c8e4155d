//! Pinned byte arena with extent allocation.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────── PinnedRegion (mlocked) ─────────────────────────────┐
//!   │ [ A: 0..2M ][ free ][ C: 3M..7M ][ free ................................. ]      │
//!   └──────────────────────────────────────────────────────────────────────────────────┘
//!                   ▲                     ▲
//!                   └──── FreeExtents ────┘  (best-fit, coalescing)
//! ```
//!
//! The arena only knows extents. It does not know which key owns which
//! extent; the [`EntryIndex`](crate::store::index::EntryIndex) holds that
//! mapping, and the cache core keeps the two in step inside one critical
//! section.
//!
//! ## Compaction
//!
//! Eviction frees extents wherever they happen to be, so enough free bytes
//! may exist without a contiguous run. [`Arena::compact`] slides every live
//! extent toward offset 0 in offset order (each move is a `copy_within`
//! into space that is already free or already copied) and leaves a single
//! free tail.

use crate::ds::{Extent, FreeExtents, PinnedRegion};
use crate::error::CacheError;

#[derive(Debug)]
pub struct Arena {
    region: PinnedRegion,
    free: FreeExtents,
}

impl Arena {
    /// Allocates and pins a region of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        let region = PinnedRegion::new(capacity)?;
        Ok(Self {
            region,
            free: FreeExtents::new(capacity),
        })
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    /// Bytes held by live extents.
    pub fn used(&self) -> usize {
        self.capacity() - self.free.free_bytes()
    }

    pub fn free_bytes(&self) -> usize {
        self.free.free_bytes()
    }

    pub fn largest_run(&self) -> usize {
        self.free.largest_run()
    }

    /// Reserves `len` contiguous bytes, or `None` if no run fits.
    pub fn allocate(&mut self, len: usize) -> Option<Extent> {
        self.free.allocate(len)
    }

    /// Releases `extent`. Any position is allowed.
    pub fn free(&mut self, extent: Extent) {
        self.free.free(extent);
    }

    pub fn read(&self, extent: Extent) -> &[u8] {
        &self.region.as_slice()[extent.offset()..extent.end()]
    }

    /// Copies `bytes` into `extent`. The lengths must match.
    pub fn write(&mut self, extent: Extent, bytes: &[u8]) {
        debug_assert_eq!(extent.len(), bytes.len());
        self.region.as_mut_slice()[extent.offset()..extent.end()].copy_from_slice(bytes);
    }

    /// Packs the live extents into `0..used` and rewrites their offsets.
    ///
    /// `live` must be exactly the set of extents currently allocated.
    /// Returns the number of bytes moved.
    pub fn compact<'a>(&mut self, live: impl IntoIterator<Item = &'a mut Extent>) -> usize {
        let mut live: Vec<&'a mut Extent> = live.into_iter().filter(|e| !e.is_empty()).collect();
        live.sort_unstable_by_key(|e| e.offset());

        let bytes = self.region.as_mut_slice();
        let mut cursor = 0;
        let mut moved = 0;
        for extent in live {
            if extent.offset() != cursor {
                bytes.copy_within(extent.offset()..extent.end(), cursor);
                extent.relocate(cursor);
                moved += extent.len();
            }
            cursor += extent.len();
        }

        debug_assert_eq!(cursor, self.used(), "compaction saw a different live set");
        self.free.reset_to_tail(cursor);
        moved
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.free.debug_validate_invariants();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut arena = Arena::new(64).unwrap();
        let ext = arena.allocate(5).unwrap();
        arena.write(ext, b"hello");
        assert_eq!(arena.read(ext), b"hello");
        assert_eq!(arena.used(), 5);
    }

    #[test]
    fn freed_space_is_reused_without_reset() {
        let mut arena = Arena::new(30).unwrap();
        let a = arena.allocate(10).unwrap();
        let b = arena.allocate(10).unwrap();
        let _c = arena.allocate(10).unwrap();
        assert_eq!(arena.allocate(1), None);

        arena.free(b);
        let d = arena.allocate(10).unwrap();
        assert_eq!(d, b);
        assert_eq!(arena.used(), 30);
        assert!(!d.overlaps(&a));
    }

    #[test]
    fn compact_packs_live_extents_and_keeps_bytes() {
        let mut arena = Arena::new(40).unwrap();
        let a = arena.allocate(10).unwrap();
        let mut b = arena.allocate(10).unwrap();
        let c = arena.allocate(10).unwrap();
        let mut d = arena.allocate(10).unwrap();
        arena.write(b, &[b'b'; 10]);
        arena.write(d, &[b'd'; 10]);
        arena.free(a);
        arena.free(c);
        assert_eq!(arena.allocate(20), None);

        let moved = arena.compact([&mut d, &mut b]);
        assert_eq!(moved, 20);
        assert_eq!(b, Extent::new(0, 10));
        assert_eq!(d, Extent::new(10, 10));
        assert_eq!(arena.read(b), &[b'b'; 10]);
        assert_eq!(arena.read(d), &[b'd'; 10]);
        assert_eq!(arena.largest_run(), 20);
        assert_eq!(arena.allocate(20), Some(Extent::new(20, 20)));
        arena.debug_validate_invariants();
    }

    #[test]
    fn compact_with_nothing_live_frees_everything() {
        let mut arena = Arena::new(16).unwrap();
        let a = arena.allocate(8).unwrap();
        arena.free(a);
        assert_eq!(arena.compact(std::iter::empty()), 0);
        assert_eq!(arena.largest_run(), 16);
    }
}
