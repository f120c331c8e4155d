//! Arena, index and policy behind one lock.
//!
//! Every mutation that touches both the arena and the index happens in a
//! single `&mut self` method here, so no caller can observe an index record
//! whose extent has already been freed, or an allocated extent with no
//! record.
//!
//! ## Admission
//!
//! ```text
//!   admit(key, bytes)
//!     size > capacity ───────────────────────────► Uncacheable
//!     key resident ──────────────────────────────► DuplicateKey
//!     shortfall = size - free_bytes
//!     policy.select_victims(shortfall) == None ──► NoSpaceAfterEviction
//!     evict victims (index remove + arena free, one step each)
//!     allocate(size)
//!       └─ no contiguous run? compact, allocate again
//!     write bytes, insert record
//! ```

use tracing::debug;

use crate::builder::CacheConfig;
use crate::ds::Extent;
use crate::error::{AdmissionError, CacheError, InvariantError};
use crate::policy::{EvictionPolicy, Policy, PolicyKind};
use crate::store::{Arena, CacheKey, Entry, EntryIndex};

/// Result of a successful admission.
#[derive(Debug)]
pub(crate) struct Admitted {
    pub evicted: Vec<CacheKey>,
    pub compacted: bool,
}

#[derive(Debug)]
pub(crate) struct CacheCore {
    arena: Arena,
    index: EntryIndex,
    policy: Policy,
}

impl CacheCore {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        Ok(Self {
            arena: Arena::new(config.capacity)?,
            index: EntryIndex::new(config.max_key_len),
            policy: Policy::new(config.policy),
        })
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn used(&self) -> usize {
        self.index.used()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn lookup(&self, key: &str) -> Option<&Entry> {
        self.index.lookup(key)
    }

    pub fn bytes_of(&self, entry: &Entry) -> &[u8] {
        self.arena.read(entry.extent())
    }

    /// Copies `bytes` into the arena under `key`, evicting as the policy
    /// directs. On error nothing has been inserted.
    pub fn admit(
        &mut self,
        key: CacheKey,
        bytes: &[u8],
        seq: u64,
    ) -> Result<Admitted, AdmissionError> {
        let size = bytes.len();
        let capacity = self.arena.capacity();
        if size > capacity {
            return Err(AdmissionError::Uncacheable { size, capacity });
        }
        if key.len() > self.index.max_key_len() {
            return Err(AdmissionError::KeyTooLong {
                len: key.len(),
                max: self.index.max_key_len(),
            });
        }
        if self.index.contains(key.as_str()) {
            return Err(AdmissionError::DuplicateKey);
        }

        let shortfall = size.saturating_sub(self.arena.free_bytes());
        let victims = self
            .policy
            .select_victims(&self.index, shortfall)
            .ok_or(AdmissionError::NoSpaceAfterEviction { size })?;
        for victim in &victims {
            self.evict(victim.as_str());
        }

        let mut compacted = false;
        let extent = match self.arena.allocate(size) {
            Some(extent) => extent,
            None => {
                self.compact();
                compacted = true;
                self.arena
                    .allocate(size)
                    .ok_or(AdmissionError::NoSpaceAfterEviction { size })?
            },
        };

        self.arena.write(extent, bytes);
        if let Err(err) = self.index.insert(key, extent, seq) {
            self.arena.free(extent);
            return Err(err);
        }
        Ok(Admitted { evicted: victims, compacted })
    }

    /// Removes `key` and frees its extent as one step. No-op if absent.
    pub fn evict(&mut self, key: &str) -> Option<Entry> {
        let entry = self.index.remove(key)?;
        self.arena.free(entry.extent());
        Some(entry)
    }

    fn compact(&mut self) {
        let Self { arena, index, .. } = self;
        let moved = arena.compact(index.extents_mut());
        debug!(moved, used = index.used(), "compacted arena");
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let capacity = self.arena.capacity();
        let summed: usize = self.index.iter().map(Entry::size).sum();
        if summed != self.index.used() {
            return Err(InvariantError::new(format!(
                "index used {} but entry sizes sum to {summed}",
                self.index.used()
            )));
        }
        if self.arena.used() != self.index.used() {
            return Err(InvariantError::new(format!(
                "arena holds {} bytes but index accounts for {}",
                self.arena.used(),
                self.index.used()
            )));
        }
        if self.index.used() > capacity {
            return Err(InvariantError::new(format!(
                "used {} exceeds capacity {capacity}",
                self.index.used()
            )));
        }

        let mut extents: Vec<(Extent, &str)> = Vec::with_capacity(self.index.len());
        for entry in self.index.iter() {
            if entry.key().len() > self.index.max_key_len() {
                return Err(InvariantError::new(format!(
                    "key {} exceeds {} bytes",
                    entry.key(),
                    self.index.max_key_len()
                )));
            }
            if entry.extent().end() > capacity {
                return Err(InvariantError::new(format!(
                    "extent of {} crosses the arena boundary",
                    entry.key()
                )));
            }
            if !entry.extent().is_empty() {
                extents.push((entry.extent(), entry.key().as_str()));
            }
        }
        extents.sort_unstable();
        for pair in extents.windows(2) {
            let ((a, a_key), (b, b_key)) = (pair[0], pair[1]);
            if a.overlaps(&b) {
                return Err(InvariantError::new(format!(
                    "extents of {a_key} and {b_key} overlap"
                )));
            }
        }

        if self.index.iter_in_insertion_order().count() != self.index.len() {
            return Err(InvariantError::new("insertion order out of step with index"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(capacity: usize, policy: PolicyKind) -> CacheCore {
        CacheCore::new(&CacheConfig::new(capacity, policy)).unwrap()
    }

    fn key(s: &str) -> CacheKey {
        CacheKey::new(s, 64).unwrap()
    }

    #[test]
    fn admit_then_read_back() {
        let mut core = core(64, PolicyKind::Fifo);
        let admitted = core.admit(key("a"), b"abc", 0).unwrap();
        assert!(admitted.evicted.is_empty());

        let entry = core.lookup("a").unwrap();
        assert_eq!(core.bytes_of(entry), b"abc");
        assert_eq!(core.used(), 3);
        core.check_invariants().unwrap();
    }

    #[test]
    fn item_larger_than_capacity_is_uncacheable() {
        let mut core = core(8, PolicyKind::CostAware);
        let err = core.admit(key("big"), &[0; 9], 0).unwrap_err();
        assert_eq!(err, AdmissionError::Uncacheable { size: 9, capacity: 8 });
        assert_eq!(core.len(), 0);
    }

    #[test]
    fn duplicate_admission_is_refused_without_eviction() {
        let mut core = core(8, PolicyKind::Fifo);
        core.admit(key("a"), &[1; 8], 0).unwrap();
        let err = core.admit(key("a"), &[2; 8], 1).unwrap_err();
        assert_eq!(err, AdmissionError::DuplicateKey);
        assert_eq!(core.bytes_of(core.lookup("a").unwrap()), &[1; 8]);
    }

    #[test]
    fn fifo_evicts_oldest_to_make_room() {
        let mut core = core(20, PolicyKind::Fifo);
        core.admit(key("a"), &[b'a'; 10], 0).unwrap();
        core.admit(key("b"), &[b'b'; 10], 1).unwrap();
        let admitted = core.admit(key("c"), &[b'c'; 10], 2).unwrap();

        assert_eq!(admitted.evicted, vec![key("a")]);
        assert!(core.lookup("a").is_none());
        assert_eq!(core.bytes_of(core.lookup("b").unwrap()), &[b'b'; 10]);
        assert_eq!(core.bytes_of(core.lookup("c").unwrap()), &[b'c'; 10]);
        core.check_invariants().unwrap();
    }

    #[test]
    fn fragmented_free_space_is_compacted() {
        let mut core = core(40, PolicyKind::Fifo);
        core.admit(key("a"), &[b'a'; 10], 0).unwrap();
        core.admit(key("b"), &[b'b'; 10], 1).unwrap();
        core.admit(key("c"), &[b'c'; 10], 2).unwrap();
        core.admit(key("d"), &[b'd'; 10], 3).unwrap();
        core.evict("a");
        core.evict("c");

        // 20 bytes free in two 10-byte holes.
        let admitted = core.admit(key("e"), &[b'e'; 20], 4).unwrap();
        assert!(admitted.evicted.is_empty());
        assert!(admitted.compacted);
        for (k, byte) in [("b", b'b'), ("d", b'd')] {
            assert_eq!(core.bytes_of(core.lookup(k).unwrap()), &[byte; 10]);
        }
        assert_eq!(core.bytes_of(core.lookup("e").unwrap()), &[b'e'; 20]);
        core.check_invariants().unwrap();
    }

    #[test]
    fn eviction_frees_extent_and_record_together() {
        let mut core = core(16, PolicyKind::CostAware);
        core.admit(key("a"), &[1; 16], 0).unwrap();
        let entry = core.evict("a").unwrap();
        assert_eq!(entry.size(), 16);
        assert_eq!(core.used(), 0);
        assert!(core.evict("a").is_none());
        core.check_invariants().unwrap();
    }

    #[test]
    fn zero_length_items_are_resident_without_bytes() {
        let mut core = core(4, PolicyKind::Fifo);
        core.admit(key("empty"), &[], 0).unwrap();
        core.admit(key("full"), &[9; 4], 1).unwrap();
        assert!(core.lookup("empty").is_some());
        assert_eq!(core.bytes_of(core.lookup("empty").unwrap()), &[] as &[u8]);
        assert_eq!(core.used(), 4);
        core.check_invariants().unwrap();
    }
}
