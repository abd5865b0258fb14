//! Cache Entry Module
//!
//! Defines individual cache entries with TTL support, and the present/absent
//! distinction used for negative caching.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Cached Value ==
/// A cached lookup result.
///
/// `Absent` records that the store confirmed the key does not exist. It is
/// distinct from the key not being cached at all, which stores express as
/// `Option::None` around this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    Present(T),
    Absent,
}

impl<T> Cached<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Cached::Absent)
    }

    /// Collapses to the store's "maybe an item" view.
    pub fn into_option(self) -> Option<T> {
        match self {
            Cached::Present(value) => Some(value),
            Cached::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for Cached<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Cached::Present(value),
            None => Cached::Absent,
        }
    }
}

// == Cache Entry ==
/// A single cache entry with value and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry that expires `ttl` from now.
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        Self {
            value,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime; zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        Duration::from_millis(self.expires_at.saturating_sub(current_timestamp_ms()))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
