//! Schema Cache
//!
//! Key schemas and secondary indexes per table, fetched through
//! `describe_table` on first use and kept for a long TTL. Concurrent misses
//! for the same table share a single fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::backend::TableStore;
use crate::cache::{CacheStats, TtlStore, DEFAULT_SCHEMA_TTL};
use crate::error::{CacheError, RemoteError, Result};
use crate::keys::target_key_schema;
use crate::models::{KeySchema, TableSchema};

/// Failure shared with every caller waiting on the same fetch.
#[derive(Debug, Clone)]
enum FetchFailure {
    Remote(RemoteError),
    Other(String),
}

impl From<CacheError> for FetchFailure {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Remote(remote) => FetchFailure::Remote(remote),
            other => FetchFailure::Other(other.to_string()),
        }
    }
}

impl From<FetchFailure> for CacheError {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Remote(remote) => CacheError::Remote(remote),
            FetchFailure::Other(message) => CacheError::Schema(message),
        }
    }
}

type FetchResult = std::result::Result<Arc<TableSchema>, FetchFailure>;

/// Slot for one in-flight fetch. The fetching task holds the mutex until it
/// has written the outcome; waiters lock it to read that outcome.
type Flight = Arc<Mutex<Option<FetchResult>>>;

enum Role {
    Leader(OwnedMutexGuard<Option<FetchResult>>, Flight),
    Waiter(Flight),
}

// == Schema Cache ==
#[derive(Debug)]
pub struct SchemaCache {
    entries: RwLock<TtlStore<Arc<TableSchema>>>,
    in_flight: Mutex<HashMap<String, Flight>>,
    ttl: Duration,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(1024, DEFAULT_SCHEMA_TTL)
    }
}

impl SchemaCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(TtlStore::new(max_entries)),
            in_flight: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    // == Schema Lookup ==
    /// Returns the schema of `table`, fetching it from `store` on a miss.
    ///
    /// Only one fetch per table runs at a time; other callers wait for its
    /// outcome. Failures are handed to every waiter but never cached.
    pub async fn schema_of<S>(&self, store: &S, table: &str) -> Result<Arc<TableSchema>>
    where
        S: TableStore + ?Sized,
    {
        loop {
            if let Some(schema) = self.entries.write().await.get(table) {
                return Ok(schema);
            }

            let role = {
                let mut flights = self.in_flight.lock().await;
                match flights.get(table) {
                    Some(flight) => Role::Waiter(flight.clone()),
                    None => {
                        // A leader may have stored the schema and released
                        // its slot since the lookup above.
                        if self.entries.read().await.peek(table).is_some() {
                            continue;
                        }
                        let flight: Flight = Arc::new(Mutex::new(None));
                        let guard = flight.clone().lock_owned().await;
                        flights.insert(table.to_string(), flight.clone());
                        Role::Leader(guard, flight)
                    }
                }
            };

            match role {
                Role::Leader(mut guard, flight) => {
                    debug!("Fetching schema for table {}", table);
                    let outcome: FetchResult = store
                        .describe_table(table)
                        .await
                        .map(Arc::new)
                        .map_err(FetchFailure::from);

                    if let Ok(schema) = &outcome {
                        self.entries
                            .write()
                            .await
                            .set(table.to_string(), schema.clone(), self.ttl);
                    }
                    *guard = Some(outcome.clone());
                    self.release(table, &flight).await;
                    drop(guard);
                    return outcome.map_err(CacheError::from);
                }
                Role::Waiter(flight) => {
                    let outcome = flight.lock().await.clone();
                    match outcome {
                        Some(outcome) => return outcome.map_err(CacheError::from),
                        None => {
                            // The fetching task was dropped before finishing.
                            debug!("Schema fetch for {} was abandoned, retrying", table);
                            self.release(table, &flight).await;
                        }
                    }
                }
            }
        }
    }

    /// Key schema of a secondary index.
    pub async fn index_schema_of<S>(&self, store: &S, table: &str, index: &str) -> Result<KeySchema>
    where
        S: TableStore + ?Sized,
    {
        let schema = self.schema_of(store, table).await?;
        target_key_schema(&schema, Some(index)).cloned()
    }

    async fn release(&self, table: &str, flight: &Flight) {
        let mut flights = self.in_flight.lock().await;
        if flights.get(table).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            flights.remove(table);
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.entries.write().await.cleanup_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.entries.read().await.stats()
    }
}
