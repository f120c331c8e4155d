use serde::Serialize;

/// Point-in-time view of a cache's counters and gauges.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,

    pub admissions: u64,
    pub rejected_admissions: u64, // uncacheable, or no room even after eviction
    pub evictions: u64,
    pub compactions: u64,

    pub shared_fetches: u64, // misses served by another caller's in-flight fetch
    pub uncached_reads: u64, // misses read without attempting admission

    // gauges captured at snapshot time
    pub used: usize,
    pub capacity: usize,
    pub len: usize,
}

impl CacheMetricsSnapshot {
    /// Hits over all lookups, or 0 before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
