//! tablecache - an in-process cache in front of a schema-described table store
//!
//! Caches point reads, queries and scans, and keeps them coherent with writes
//! made through the same proxy by purging every index group a write can touch.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod proxy;
pub mod schema;
pub mod tasks;

pub use api::AppState;
pub use backend::{MemoryTableStore, TableStore};
pub use config::Config;
pub use error::{CacheError, RemoteError, Result};
pub use proxy::{CachedTableStore, ProxySettings};
pub use tasks::spawn_cleanup_task;
