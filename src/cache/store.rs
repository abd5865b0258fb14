//! TTL Store Module
//!
//! Flat key/value store combining HashMap storage with LRU tracking and TTL
//! expiration. Used for items and table schemas.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheStats, LruTracker};

// == TTL Store ==
/// Key/value storage with per-entry TTL and LRU capacity eviction.
#[derive(Debug)]
pub struct TtlStore<V> {
    entries: HashMap<String, CacheEntry<V>>,
    lru: LruTracker<String>,
    stats: CacheStats,
    max_entries: usize,
}

impl<V: Clone> TtlStore<V> {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` live entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
        }
    }

    // == Set ==
    /// Stores a value, replacing any previous entry and resetting its TTL.
    ///
    /// When the store is full the least recently used entry is evicted first.
    pub fn set(&mut self, key: String, value: V, ttl: Duration) {
        let is_overwrite = self.entries.contains_key(&key);

        if !is_overwrite && self.entries.len() >= self.max_entries {
            if let Some(evicted_key) = self.lru.evict_oldest() {
                self.entries.remove(&evicted_key);
                self.stats.record_eviction();
            }
        }

        self.lru.touch(&key);
        self.entries.insert(key, CacheEntry::new(value, ttl));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns a live value and records a hit, or records a miss.
    ///
    /// Expired entries are removed on the way out.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                let value = entry.value.clone();
                self.stats.record_hit();
                self.lru.touch(&key.to_string());
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.lru.remove(&key.to_string());
            self.stats.set_total_entries(self.entries.len());
        }
        self.stats.record_miss();
        None
    }

    /// Returns a live value without touching stats or recency.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    // == Delete ==
    /// Removes an entry; returns whether one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru.remove(&key.to_string());
            self.stats.record_invalidations(1);
            self.stats.set_total_entries(self.entries.len());
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Drops every entry. Hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        self.stats.set_total_entries(self.entries.len());
        expired_keys.len()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats;
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
