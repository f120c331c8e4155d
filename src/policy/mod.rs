//! Admission and eviction strategies.
//!
//! A cache picks one strategy at construction and keeps it for its whole
//! lifetime. Both strategies answer the same question through
//! [`EvictionPolicy::select_victims`]: *which residents, evicted in this
//! order, free at least `needed` bytes?* They never mutate the index; the
//! cache core performs the evictions.
//!
//! | Policy | Victim order | Module |
//! |--------|--------------|--------|
//! | [`PolicyKind::Fifo`] | oldest admission first | [`fifo`] |
//! | [`PolicyKind::CostAware`] | lowest hits-per-byte first, then oldest | [`cost_aware`] |
//!
//! ## Example Usage
//!
//! ```
//! use pincache::policy::{Policy, PolicyKind};
//!
//! let kind: PolicyKind = "cost-aware".parse().unwrap();
//! let policy = Policy::new(kind);
//! assert_eq!(policy.kind(), PolicyKind::CostAware);
//! assert_eq!(PolicyKind::Fifo.to_string(), "fifo");
//! ```

pub mod cost_aware;
pub mod fifo;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::store::{CacheKey, Entry, EntryIndex};

pub use cost_aware::CostAwarePolicy;
pub use fifo::FifoPolicy;

/// The closed set of available strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Evict in admission order.
    Fifo,
    /// Evict the lowest value density (hits per byte) first.
    #[default]
    CostAware,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Fifo => "fifo",
            PolicyKind::CostAware => "cost-aware",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(PolicyKind::Fifo),
            "cost-aware" => Ok(PolicyKind::CostAware),
            other => Err(ConfigError::new(format!(
                "unknown policy {other:?}, expected \"fifo\" or \"cost-aware\""
            ))),
        }
    }
}

/// Victim selection shared by every strategy.
pub trait EvictionPolicy {
    fn kind(&self) -> PolicyKind;

    /// Returns residents to evict, in order, whose sizes sum to at least
    /// `needed` bytes. Stops at the first prefix that suffices.
    ///
    /// Returns `None` if evicting every resident would still fall short.
    /// `needed == 0` yields an empty list.
    fn select_victims(&self, index: &EntryIndex, needed: usize) -> Option<Vec<CacheKey>>;
}

/// A strategy chosen at construction.
#[derive(Debug, Clone)]
pub enum Policy {
    Fifo(FifoPolicy),
    CostAware(CostAwarePolicy),
}

impl Policy {
    pub fn new(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Fifo => Policy::Fifo(FifoPolicy),
            PolicyKind::CostAware => Policy::CostAware(CostAwarePolicy),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        EvictionPolicy::kind(self)
    }
}

impl EvictionPolicy for Policy {
    fn kind(&self) -> PolicyKind {
        match self {
            Policy::Fifo(fifo) => fifo.kind(),
            Policy::CostAware(cost) => cost.kind(),
        }
    }

    fn select_victims(&self, index: &EntryIndex, needed: usize) -> Option<Vec<CacheKey>> {
        match self {
            Policy::Fifo(fifo) => fifo.select_victims(index, needed),
            Policy::CostAware(cost) => cost.select_victims(index, needed),
        }
    }
}

/// Takes entries from `ranked` until their sizes cover `needed`.
///
/// Zero-length entries free nothing and are skipped.
fn take_until<'a>(ranked: impl IntoIterator<Item = &'a Entry>, needed: usize) -> Option<Vec<CacheKey>> {
    if needed == 0 {
        return Some(Vec::new());
    }
    let mut victims = Vec::new();
    let mut freed = 0;
    for entry in ranked {
        if entry.size() == 0 {
            continue;
        }
        victims.push(entry.key().clone());
        freed += entry.size();
        if freed >= needed {
            return Some(victims);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_kind_parses_and_displays() {
        for kind in [PolicyKind::Fifo, PolicyKind::CostAware] {
            assert_eq!(kind.to_string().parse::<PolicyKind>(), Ok(kind));
        }
        assert!("lru".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn policy_kind_serde_uses_kebab_case() {
        let json = serde_json::to_string(&PolicyKind::CostAware).unwrap();
        assert_eq!(json, "\"cost-aware\"");
        let kind: PolicyKind = serde_json::from_str("\"fifo\"").unwrap();
        assert_eq!(kind, PolicyKind::Fifo);
    }

    #[test]
    fn default_policy_is_cost_aware() {
        assert_eq!(PolicyKind::default(), PolicyKind::CostAware);
    }

    #[test]
    fn policy_dispatch_reports_kind() {
        assert_eq!(Policy::new(PolicyKind::Fifo).kind(), PolicyKind::Fifo);
        assert_eq!(
            Policy::new(PolicyKind::CostAware).kind(),
            PolicyKind::CostAware
        );
    }

    #[test]
    fn needing_nothing_selects_nothing() {
        let index = EntryIndex::new(8);
        for kind in [PolicyKind::Fifo, PolicyKind::CostAware] {
            assert_eq!(Policy::new(kind).select_victims(&index, 0), Some(vec![]));
            assert_eq!(Policy::new(kind).select_victims(&index, 1), None);
        }
    }
}
