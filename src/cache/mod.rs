//! Cache Module
//!
//! In-memory storage primitives with TTL expiration and LRU eviction: a flat
//! store for items and schemas, and a grouped store for query and scan
//! results.

mod entry;
mod grouped;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, Cached};
pub use grouped::GroupedStore;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::TtlStore;

use std::time::Duration;

// == Public Constants ==
/// Default lifetime of a cached item
pub const DEFAULT_ITEM_TTL: Duration = Duration::from_secs(15 * 60);

/// Default lifetime of a cached query or scan page
pub const DEFAULT_QUERY_TTL: Duration = Duration::from_secs(5 * 60);

/// Default lifetime of a cached table schema
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(24 * 60 * 60);
