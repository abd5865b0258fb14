//! Cache Statistics Module
//!
//! Tracks per-store lookup outcomes, evictions and invalidations.

use serde::Serialize;

// == Cache Stats ==
/// Per-store counters. Lookup counters are cumulative and survive a clear.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the store (including confirmed-absent entries)
    pub hits: u64,
    /// Lookups that found nothing, or only an expired entry
    pub misses: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
    /// Entries dropped by explicit invalidation
    pub invalidations: u64,
    /// Current number of live entries
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_invalidations(&mut self, count: usize) {
        self.invalidations += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }

    /// Sums counters across stores.
    pub fn combine(stats: &[CacheStats]) -> CacheStats {
        stats.iter().fold(CacheStats::new(), |mut acc, s| {
            acc.hits += s.hits;
            acc.misses += s.misses;
            acc.evictions += s.evictions;
            acc.invalidations += s.invalidations;
            acc.total_entries += s.total_entries;
            acc
        })
    }
}
