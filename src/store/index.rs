//! Key-indexed entry metadata.
//!
//! ## Architecture
//! - `entries: FxHashMap<CacheKey, Entry>` gives O(1) expected lookup,
//!   insert and remove.
//! - `insertion_order: BTreeSet<(seq, CacheKey)>` is the read-only view the
//!   FIFO policy walks. Equal sequence numbers fall back to key order.
//! - `used` is the sum of resident entry sizes, maintained on every insert
//!   and remove.
//!
//! ## Hit statistics
//! Hit counters live in atomics on the entry, so a hit only needs shared
//! access to the index. Extents and sizes are immutable once inserted,
//! except for compaction, which needs exclusive access.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::ds::Extent;
use crate::error::AdmissionError;
use crate::store::key::CacheKey;

/// Metadata for one resident item.
#[derive(Debug)]
pub struct Entry {
    key: CacheKey,
    extent: Extent,
    seq: u64,
    hits: AtomicU64,
    last_access: AtomicU64,
}

impl Entry {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn size(&self) -> usize {
        self.extent.len()
    }

    /// Admission sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Accesses recorded for this entry, counting the read that admitted it.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Access clock value of the most recent hit (or of admission).
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    pub fn record_hit(&self, tick: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.last_access.fetch_max(tick, Ordering::Relaxed);
    }

    pub fn stats(&self) -> EntryStats {
        EntryStats {
            size: self.size(),
            seq: self.seq,
            hits: self.hits(),
            last_access: self.last_access(),
        }
    }
}

/// Point-in-time copy of an entry's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStats {
    pub size: usize,
    pub seq: u64,
    pub hits: u64,
    pub last_access: u64,
}

#[derive(Debug)]
pub struct EntryIndex {
    entries: FxHashMap<CacheKey, Entry>,
    insertion_order: BTreeSet<(u64, CacheKey)>,
    used: usize,
    max_key_len: usize,
}

impl EntryIndex {
    pub fn new(max_key_len: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            insertion_order: BTreeSet::new(),
            used: 0,
            max_key_len,
        }
    }

    pub fn max_key_len(&self) -> usize {
        self.max_key_len
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of resident entry sizes.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn lookup(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Adds a record. The key must be absent; stale records are removed
    /// first, never overwritten.
    pub(crate) fn insert(
        &mut self,
        key: CacheKey,
        extent: Extent,
        seq: u64,
    ) -> Result<&Entry, AdmissionError> {
        if key.len() > self.max_key_len {
            return Err(AdmissionError::KeyTooLong {
                len: key.len(),
                max: self.max_key_len,
            });
        }
        if self.entries.contains_key(key.as_str()) {
            return Err(AdmissionError::DuplicateKey);
        }

        self.insertion_order.insert((seq, key.clone()));
        self.used += extent.len();
        let entry = self.entries.entry(key.clone()).or_insert(Entry {
            key,
            extent,
            seq,
            hits: AtomicU64::new(1),
            last_access: AtomicU64::new(seq),
        });
        Ok(entry)
    }

    /// Removes and returns the record for `key`. No-op if absent.
    ///
    /// The caller owns freeing the returned entry's extent.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.insertion_order.remove(&(entry.seq, entry.key.clone()));
        self.used -= entry.size();
        Some(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Entries from oldest to newest admission.
    pub fn iter_in_insertion_order(&self) -> impl Iterator<Item = &Entry> {
        self.insertion_order
            .iter()
            .filter_map(|(_, key)| self.entries.get(key.as_str()))
    }

    /// Entries sorted by `rank`, lowest first.
    pub fn ranked_by<F>(&self, mut rank: F) -> Vec<&Entry>
    where
        F: FnMut(&Entry, &Entry) -> CmpOrdering,
    {
        let mut ranked: Vec<&Entry> = self.entries.values().collect();
        ranked.sort_by(|a, b| rank(a, b));
        ranked
    }

    /// Mutable access to every extent, for compaction.
    pub(crate) fn extents_mut(&mut self) -> impl Iterator<Item = &mut Extent> {
        self.entries.values_mut().map(|entry| &mut entry.extent)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
        self.used = 0;
    }
}
