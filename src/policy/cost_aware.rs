//! # Cost-Aware (Value Density) Eviction
//!
//! Item sizes in a file cache span orders of magnitude. A recency-only policy
//! will happily hold one large, rarely read file in place of dozens of small
//! files that are read all the time. This policy ranks residents by *value
//! density*: accesses recovered per byte held.
//!
//! ```text
//!   S(entry) = hits / size
//!
//!   capacity 100 B
//!   ┌──────────────────────────────────────────────┬──────┬────┐
//!   │ large.bmp  90 B, hits 1   S = 0.011          │small │free│
//!   └──────────────────────────────────────────────┴──────┴────┘
//!                                                   5 B, hits 10
//!                                                   S = 2.0
//!
//!   admit third.bmp (10 B): free = 5, needed = 5
//!     ranked: [large (0.011), small (2.0)]
//!     victims: [large]            ← 90 B freed, small survives
//! ```
//!
//! ## Scoring
//!
//! - An entry starts at `hits = 1`, the read that admitted it.
//! - Every cache hit bumps `hits` with a relaxed atomic add; nothing else
//!   happens on the hit path.
//! - Scores are computed only when victims are selected, under the cache's
//!   exclusive lock, so the ranking sees a consistent snapshot.
//! - Densities are compared by cross-multiplication in `u128`
//!   (`a.hits * b.size` vs `b.hits * a.size`), so there is no float rounding
//!   and a zero-length entry ranks above everything.
//! - Equal densities evict the older admission first.
//!
//! ## Selection
//!
//! Victims are taken in ascending score order until their sizes cover the
//! shortfall, and not one more. If all residents together cannot cover it the
//! policy returns `None` and the cache skips admission without evicting
//! anything.
//!
//! ## Complexity
//!
//! | Operation        | Cost       |
//! |------------------|------------|
//! | hit bookkeeping  | O(1)       |
//! | `select_victims` | O(n log n) |

use std::cmp::Ordering;

use crate::policy::{EvictionPolicy, PolicyKind, take_until};
use crate::store::{CacheKey, Entry, EntryIndex};

#[derive(Debug, Clone, Copy, Default)]
pub struct CostAwarePolicy;

impl CostAwarePolicy {
    /// Orders `a` before `b` if `a` is the better eviction candidate.
    pub fn rank(a: &Entry, b: &Entry) -> Ordering {
        value_density_cmp(a, b).then_with(|| a.seq().cmp(&b.seq()))
    }
}

/// Compares `a.hits / a.size` with `b.hits / b.size` exactly.
pub fn value_density_cmp(a: &Entry, b: &Entry) -> Ordering {
    let lhs = u128::from(a.hits()) * b.size() as u128;
    let rhs = u128::from(b.hits()) * a.size() as u128;
    lhs.cmp(&rhs)
}

impl EvictionPolicy for CostAwarePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::CostAware
    }

    fn select_victims(&self, index: &EntryIndex, needed: usize) -> Option<Vec<CacheKey>> {
        if needed == 0 {
            return Some(Vec::new());
        }
        if index.used() < needed {
            return None;
        }
        take_until(index.ranked_by(Self::rank), needed)
    }
}
