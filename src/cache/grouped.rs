//! Grouped Store Module
//!
//! Two-level store for query and scan results. The outer group is the unit
//! of invalidation; the inner key identifies one request shape inside it.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheStats, LruTracker};

// == Grouped Store ==
/// TTL store whose entries can be dropped a whole group at a time.
#[derive(Debug)]
pub struct GroupedStore<G, V> {
    groups: HashMap<G, HashMap<String, CacheEntry<V>>>,
    lru: LruTracker<(G, String)>,
    stats: CacheStats,
    total_entries: usize,
    max_entries: usize,
}

impl<G, V> GroupedStore<G, V>
where
    G: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize) -> Self {
        Self {
            groups: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            total_entries: 0,
            max_entries: max_entries.max(1),
        }
    }

    // == Set ==
    /// Stores a value under `(group, key)`, resetting its TTL.
    pub fn set(&mut self, group: G, key: String, value: V, ttl: Duration) {
        let is_overwrite = self
            .groups
            .get(&group)
            .is_some_and(|entries| entries.contains_key(&key));

        if !is_overwrite && self.total_entries >= self.max_entries {
            if let Some((old_group, old_key)) = self.lru.evict_oldest() {
                self.remove_entry(&old_group, &old_key);
                self.stats.record_eviction();
            }
        }

        self.lru.touch(&(group.clone(), key.clone()));
        let previous = self
            .groups
            .entry(group)
            .or_default()
            .insert(key, CacheEntry::new(value, ttl));
        if previous.is_none() {
            self.total_entries += 1;
        }
        self.stats.set_total_entries(self.total_entries);
    }

    // == Get ==
    /// Returns a live value and records a hit, or records a miss.
    pub fn get(&mut self, group: &G, key: &str) -> Option<V> {
        let lookup = self
            .groups
            .get(group)
            .and_then(|entries| entries.get(key))
            .map(|entry| (entry.is_expired(), entry.value.clone()));

        match lookup {
            Some((false, value)) => {
                self.stats.record_hit();
                self.lru.touch(&(group.clone(), key.to_string()));
                Some(value)
            }
            Some((true, _)) => {
                self.remove_entry(group, key);
                self.lru.remove(&(group.clone(), key.to_string()));
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Delete Group ==
    /// Drops every entry in one group, returning how many were removed.
    pub fn delete_group(&mut self, group: &G) -> usize {
        let removed = match self.groups.remove(group) {
            Some(entries) => entries.len(),
            None => return 0,
        };
        self.lru.remove_where(|(g, _)| g == group);
        self.after_invalidation(removed);
        removed
    }

    /// Drops every group matching the predicate.
    pub fn delete_groups_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&G) -> bool,
    {
        let doomed: HashSet<G> = self
            .groups
            .keys()
            .filter(|g| predicate(g))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for group in &doomed {
            if let Some(entries) = self.groups.remove(group) {
                removed += entries.len();
            }
        }
        self.lru.remove_where(|(g, _)| doomed.contains(g));
        self.after_invalidation(removed);
        removed
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.lru.clear();
        self.total_entries = 0;
        self.stats.set_total_entries(0);
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let mut expired: HashSet<(G, String)> = HashSet::new();
        for (group, entries) in &self.groups {
            for (key, entry) in entries {
                if entry.is_expired() {
                    expired.insert((group.clone(), key.clone()));
                }
            }
        }

        for (group, key) in &expired {
            self.remove_entry(group, key);
        }
        if !expired.is_empty() {
            self.lru.remove_where(|pair| expired.contains(pair));
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats;
        stats.set_total_entries(self.total_entries);
        stats
    }

    pub fn len(&self) -> usize {
        self.total_entries
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries == 0
    }

    pub fn group_len(&self, group: &G) -> usize {
        self.groups.get(group).map_or(0, HashMap::len)
    }

    // Leaves the LRU tracker alone; callers fix it up.
    fn remove_entry(&mut self, group: &G, key: &str) {
        if let Some(entries) = self.groups.get_mut(group) {
            if entries.remove(key).is_some() {
                self.total_entries -= 1;
            }
            if entries.is_empty() {
                self.groups.remove(group);
            }
        }
        self.stats.set_total_entries(self.total_entries);
    }

    fn after_invalidation(&mut self, removed: usize) {
        self.total_entries -= removed;
        self.stats.record_invalidations(removed);
        self.stats.set_total_entries(self.total_entries);
    }
}
