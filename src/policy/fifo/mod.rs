//! Insertion-order eviction.
//!
//! The victim is always the resident with the smallest admission sequence
//! number. Hits do not change the order. Equal sequence numbers, which the
//! cache core never assigns, fall back to lexicographic key order so the
//! choice stays deterministic.

use crate::policy::{EvictionPolicy, PolicyKind, take_until};
use crate::store::{CacheKey, EntryIndex};

#[derive(Debug, Clone, Copy, Default)]
pub struct FifoPolicy;

impl EvictionPolicy for FifoPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Fifo
    }

    fn select_victims(&self, index: &EntryIndex, needed: usize) -> Option<Vec<CacheKey>> {
        take_until(index.iter_in_insertion_order(), needed)
    }
}
