//! Coalescing free list over integer extents.
//!
//! Tracks the unallocated byte ranges of a fixed-size region. Space freed at
//! any position is merged with its free neighbours, so a region that is
//! emptied one extent at a time always ends up as a single run again.
//!
//! ## Architecture
//!
//! ```text
//!   region: [ used ][ free 0x40..0x80 ][ used ][ free 0xC0..0x100 ]
//!
//!   by_offset: BTreeMap<offset, len>     by_size: BTreeSet<(len, offset)>
//!   ┌────────┬──────┐                    ┌──────────────┐
//!   │  0x40  │ 0x40 │                    │ (0x40, 0x40) │ ← best fit for 0x30
//!   │  0xC0  │ 0x40 │                    │ (0x40, 0xC0) │
//!   └────────┴──────┘                    └──────────────┘
//! ```
//!
//! - `by_offset` finds the neighbours of a freed extent in O(log n).
//! - `by_size` finds the smallest run that fits a request in O(log n); ties
//!   go to the lowest offset.
//!
//! Zero-length extents never touch either map.
//!
//! ## Example Usage
//!
//! ```
//! use pincache::ds::{Extent, FreeExtents};
//!
//! let mut free = FreeExtents::new(100);
//! let a = free.allocate(40).unwrap();
//! let b = free.allocate(40).unwrap();
//! assert_eq!(free.free_bytes(), 20);
//!
//! free.free(a);
//! free.free(b);
//! assert_eq!(free.largest_run(), 100);
//! assert_eq!(free.run_count(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

/// A contiguous byte range inside the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Extent {
    offset: usize,
    len: usize,
}

impl Extent {
    /// The extent used by zero-length items.
    pub const EMPTY: Extent = Extent { offset: 0, len: 0 };

    #[inline]
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Returns `true` if the two extents share at least one byte.
    pub fn overlaps(&self, other: &Extent) -> bool {
        !self.is_empty() && !other.is_empty() && self.offset < other.end() && other.offset < self.end()
    }

    pub(crate) fn relocate(&mut self, offset: usize) {
        self.offset = offset;
    }
}

/// Best-fit free list with neighbour coalescing.
#[derive(Debug, Clone)]
pub struct FreeExtents {
    by_offset: BTreeMap<usize, usize>,
    by_size: BTreeSet<(usize, usize)>,
    capacity: usize,
    free_bytes: usize,
}

impl FreeExtents {
    /// Creates a free list covering `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        let mut free = Self {
            by_offset: BTreeMap::new(),
            by_size: BTreeSet::new(),
            capacity,
            free_bytes: 0,
        };
        free.reset_to_tail(0);
        free
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total unallocated bytes, contiguous or not.
    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// Length of the largest contiguous free run.
    pub fn largest_run(&self) -> usize {
        self.by_size.last().map(|&(len, _)| len).unwrap_or(0)
    }

    /// Number of disjoint free runs.
    pub fn run_count(&self) -> usize {
        self.by_offset.len()
    }

    /// Carves `len` bytes out of the smallest run that fits.
    ///
    /// Returns `None` if no single run is large enough, even if
    /// [`free_bytes`](Self::free_bytes) would cover the request.
    pub fn allocate(&mut self, len: usize) -> Option<Extent> {
        if len == 0 {
            return Some(Extent::EMPTY);
        }
        let (run_len, offset) = *self.by_size.range((len, 0)..).next()?;
        self.remove_run(offset, run_len);
        if run_len > len {
            self.insert_run(offset + len, run_len - len);
        }
        self.free_bytes -= len;
        Some(Extent::new(offset, len))
    }

    /// Returns `extent` to the pool, merging it with adjacent free runs.
    ///
    /// The extent may sit anywhere in the region. Freeing an extent that is
    /// already free is a logic error and is caught in debug builds.
    pub fn free(&mut self, extent: Extent) {
        if extent.is_empty() {
            return;
        }
        debug_assert!(extent.end() <= self.capacity, "extent past region end");
        debug_assert!(
            self.by_offset
                .range(extent.offset()..extent.end())
                .next()
                .is_none(),
            "free run starts inside freed extent"
        );

        let mut start = extent.offset();
        let mut end = extent.end();

        if let Some((&prev_off, &prev_len)) = self.by_offset.range(..start).next_back() {
            debug_assert!(prev_off + prev_len <= start, "double free");
            if prev_off + prev_len == start {
                self.remove_run(prev_off, prev_len);
                start = prev_off;
            }
        }
        if let Some(&next_len) = self.by_offset.get(&end) {
            self.remove_run(end, next_len);
            end += next_len;
        }

        self.insert_run(start, end - start);
        self.free_bytes += extent.len();
    }

    /// Replaces the free list with a single run starting at `used`.
    ///
    /// Called after compaction has packed every live extent into `0..used`.
    pub fn reset_to_tail(&mut self, used: usize) {
        debug_assert!(used <= self.capacity);
        self.by_offset.clear();
        self.by_size.clear();
        if used < self.capacity {
            self.insert_run(used, self.capacity - used);
        }
        self.free_bytes = self.capacity - used;
    }

    /// Free runs in offset order.
    pub fn iter(&self) -> impl Iterator<Item = Extent> + '_ {
        self.by_offset
            .iter()
            .map(|(&offset, &len)| Extent::new(offset, len))
    }

    #[cfg(any(test, debug_assertions))]
    /// Validates internal invariants (debug/test builds only).
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.by_offset.len(), self.by_size.len());
        let mut total = 0;
        let mut prev_end = None;
        for (&offset, &len) in &self.by_offset {
            assert!(len > 0);
            assert!(offset + len <= self.capacity);
            assert!(self.by_size.contains(&(len, offset)));
            if let Some(prev_end) = prev_end {
                // Adjacent runs must have been coalesced.
                assert!(prev_end < offset);
            }
            prev_end = Some(offset + len);
            total += len;
        }
        assert_eq!(total, self.free_bytes);
    }

    fn insert_run(&mut self, offset: usize, len: usize) {
        self.by_offset.insert(offset, len);
        self.by_size.insert((len, offset));
    }

    fn remove_run(&mut self, offset: usize, len: usize) {
        self.by_offset.remove(&offset);
        self.by_size.remove(&(len, offset));
    }
}
