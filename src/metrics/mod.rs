//! Cache counters.
//!
//! Counters are relaxed atomics: they are observational and never feed back
//! into admission or eviction decisions. Gauges (`used`, `len`) are read from
//! the cache core when a snapshot is taken.

pub mod snapshot;

use std::sync::atomic::{AtomicU64, Ordering};

pub use snapshot::CacheMetricsSnapshot;

#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    admissions: AtomicU64,
    rejected_admissions: AtomicU64,
    evictions: AtomicU64,
    compactions: AtomicU64,
    shared_fetches: AtomicU64,
    uncached_reads: AtomicU64,
}

impl CacheCounters {
    pub fn snapshot(&self, used: usize, capacity: usize, len: usize) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            admissions: self.admissions.load(Ordering::Relaxed),
            rejected_admissions: self.rejected_admissions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            shared_fetches: self.shared_fetches.load(Ordering::Relaxed),
            uncached_reads: self.uncached_reads.load(Ordering::Relaxed),
            used,
            capacity,
            len,
        }
    }

    pub fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_admission(&self) {
        self.admissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_admission(&self) {
        self.rejected_admissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_evictions(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_shared_fetch(&self) {
        self.shared_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_uncached_read(&self) {
        self.uncached_reads.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_copies_counters_and_gauges() {
        let counters = CacheCounters::default();
        counters.inc_hit();
        counters.inc_hit();
        counters.inc_miss();
        counters.add_evictions(3);

        let snap = counters.snapshot(10, 100, 2);
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.evictions, 3);
        assert_eq!((snap.used, snap.capacity, snap.len), (10, 100, 2));
        assert!((snap.hit_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
    }
}
