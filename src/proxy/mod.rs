//! Caching Proxy
//!
//! `CachedTableStore` decorates any `TableStore` with an item cache, grouped
//! query and scan caches, and a schema cache. Reads are answered from the
//! caches where possible; writes keep the caches coherent by purging every
//! query and scan group the mutated item could appear in.

mod invalidation;
mod prefetch;
mod reads;
mod writes;

pub use invalidation::{plan, GroupSelector, InvalidationPlan, Snapshot};
pub use prefetch::{PrefetchSet, PrefetchedImage};

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::TableStore;
use crate::cache::{
    CacheStats, Cached, GroupedStore, TtlStore, DEFAULT_ITEM_TTL, DEFAULT_QUERY_TTL,
    DEFAULT_SCHEMA_TTL,
};
use crate::error::Result;
use crate::keys::GroupKey;
use crate::models::{
    BatchGetItemOutput, BatchGetItemRequest, BatchWriteItemOutput, BatchWriteItemRequest,
    DeleteItemOutput, DeleteItemRequest, GetItemOutput, GetItemRequest, Item, PutItemOutput,
    PutItemRequest, QueryOutput, QueryRequest, ScanOutput, ScanRequest, StatsResponse,
    TableSchema, TransactWriteItemsOutput, TransactWriteItemsRequest, UpdateItemOutput,
    UpdateItemRequest,
};
use crate::schema::SchemaCache;

// == Proxy Settings ==
/// Tunables for a `CachedTableStore`.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub item_ttl: Duration,
    pub query_ttl: Duration,
    pub scan_ttl: Duration,
    pub schema_ttl: Duration,
    pub max_item_entries: usize,
    /// Capacity of the query store and of the scan store, each
    pub max_query_entries: usize,
    /// Ask the store for old or new images the caller did not request
    pub upgrade_return_values: bool,
    /// Tables to cache; empty caches every table
    pub allowed_tables: Vec<String>,
    pub debug: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            item_ttl: DEFAULT_ITEM_TTL,
            query_ttl: DEFAULT_QUERY_TTL,
            scan_ttl: DEFAULT_QUERY_TTL,
            schema_ttl: DEFAULT_SCHEMA_TTL,
            max_item_entries: 10_000,
            max_query_entries: 1_000,
            upgrade_return_values: true,
            allowed_tables: Vec::new(),
            debug: false,
        }
    }
}

// == Cached Table Store ==
pub struct CachedTableStore<S> {
    inner: S,
    schemas: SchemaCache,
    items: RwLock<TtlStore<Cached<Item>>>,
    queries: RwLock<GroupedStore<GroupKey, QueryOutput>>,
    scans: RwLock<GroupedStore<GroupKey, ScanOutput>>,
    allowed: RwLock<HashSet<String>>,
    debug: AtomicBool,
    settings: ProxySettings,
}

impl<S: TableStore> CachedTableStore<S> {
    pub fn new(inner: S, settings: ProxySettings) -> Self {
        Self {
            inner,
            schemas: SchemaCache::new(1024, settings.schema_ttl),
            items: RwLock::new(TtlStore::new(settings.max_item_entries)),
            queries: RwLock::new(GroupedStore::new(settings.max_query_entries)),
            scans: RwLock::new(GroupedStore::new(settings.max_query_entries)),
            allowed: RwLock::new(settings.allowed_tables.iter().cloned().collect()),
            debug: AtomicBool::new(settings.debug),
            settings,
        }
    }

    /// The undecorated store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    // == Administration ==
    /// Adds a table to the allow-list. While the list is empty every table
    /// is cached.
    pub async fn allow(&self, table: &str) {
        info!("Caching enabled for table {}", table);
        self.allowed.write().await.insert(table.to_string());
    }

    pub async fn is_allowed(&self, table: &str) -> bool {
        let allowed = self.allowed.read().await;
        allowed.is_empty() || allowed.contains(table)
    }

    /// Empties every store. Hit and miss counters are kept.
    pub async fn purge_all(&self) {
        self.items.write().await.clear();
        self.schemas.clear().await;
        self.queries.write().await.clear();
        self.scans.write().await.clear();
        info!("All caches purged");
    }

    /// Cumulative hit ratio over item, query and scan lookups.
    pub async fn hit_ratio(&self) -> f64 {
        let combined = CacheStats::combine(&[
            self.items.read().await.stats(),
            self.queries.read().await.stats(),
            self.scans.read().await.stats(),
        ]);
        combined.hit_rate()
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
        info!("Cache debug logging {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub async fn stats(&self) -> StatsResponse {
        StatsResponse {
            hit_ratio: self.hit_ratio().await,
            items: self.items.read().await.stats(),
            queries: self.queries.read().await.stats(),
            scans: self.scans.read().await.stats(),
            schemas: self.schemas.stats().await,
        }
    }

    /// Drops expired entries from every store, returning how many went.
    pub async fn cleanup_expired(&self) -> usize {
        self.items.write().await.cleanup_expired()
            + self.queries.write().await.cleanup_expired()
            + self.scans.write().await.cleanup_expired()
            + self.schemas.cleanup_expired().await
    }

    // == Cache Plumbing ==
    fn note(&self, event: &str, op: &str, key: &dyn fmt::Display) {
        if self.debug_enabled() {
            info!("cache {} [{}] {}", event, op, key);
        }
    }

    async fn schema_of(&self, table: &str) -> Result<Arc<TableSchema>> {
        self.schemas.schema_of(&self.inner, table).await
    }

    async fn lookup_item(&self, op: &str, key: &str) -> Option<Cached<Item>> {
        let found = self.items.write().await.get(key);
        self.note(if found.is_some() { "hit" } else { "miss" }, op, &key);
        found
    }

    async fn cache_item(&self, op: &str, key: String, value: Cached<Item>) {
        self.note(if value.is_absent() { "set-absent" } else { "set" }, op, &key);
        self.items
            .write()
            .await
            .set(key, value, self.settings.item_ttl);
    }

    async fn evict_item(&self, op: &str, key: &str) {
        if self.items.write().await.delete(key) {
            self.note("evict", op, &key);
        }
    }

    // == Invalidation ==
    /// Purges every query and scan group the snapshot's item could be in.
    async fn invalidate(&self, op: &str, schema: &TableSchema, snapshot: Snapshot<'_>) -> Result<()> {
        let plan = plan(schema, snapshot)?;

        let scans = self
            .scans
            .write()
            .await
            .delete_groups_where(|group| group.table == plan.scan_table);

        let mut queries = 0;
        {
            let mut store = self.queries.write().await;
            for selector in &plan.query_groups {
                queries += match selector {
                    GroupSelector::Exact(group) => store.delete_group(group),
                    other => store.delete_groups_where(|group| other.matches(group)),
                };
            }
        }

        debug!(
            "Invalidated {} query and {} scan entries for {}",
            queries, scans, plan.scan_table
        );
        if self.debug_enabled() {
            for (event, group) in plan.log_lines() {
                self.note(event, op, &group);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: TableStore> TableStore for CachedTableStore<S> {
    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        Ok(self.schema_of(table).await?.as_ref().clone())
    }

    async fn get_item(&self, req: GetItemRequest) -> Result<GetItemOutput> {
        self.read_item(req).await
    }

    async fn put_item(&self, req: PutItemRequest) -> Result<PutItemOutput> {
        self.write_put(req).await
    }

    async fn delete_item(&self, req: DeleteItemRequest) -> Result<DeleteItemOutput> {
        self.write_delete(req).await
    }

    async fn update_item(&self, req: UpdateItemRequest) -> Result<UpdateItemOutput> {
        self.write_update(req).await
    }

    async fn batch_get_item(&self, req: BatchGetItemRequest) -> Result<BatchGetItemOutput> {
        self.read_batch(req).await
    }

    async fn batch_write_item(&self, req: BatchWriteItemRequest) -> Result<BatchWriteItemOutput> {
        self.write_batch(req).await
    }

    async fn transact_write_items(
        &self,
        req: TransactWriteItemsRequest,
    ) -> Result<TransactWriteItemsOutput> {
        self.write_transaction(req).await
    }

    async fn query(&self, req: QueryRequest) -> Result<QueryOutput> {
        self.read_query(req).await
    }

    async fn scan(&self, req: ScanRequest) -> Result<ScanOutput> {
        self.read_scan(req).await
    }
}
