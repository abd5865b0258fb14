//! Shared fixtures for integration tests
//!
//! `RecordingStore` wraps the in-memory store, records every call that
//! reaches it, and can be told to misbehave.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tablecache::models::{
    AttributeValue, BatchGetItemOutput, BatchGetItemRequest, BatchWriteItemOutput,
    BatchWriteItemRequest, DeleteItemOutput, DeleteItemRequest, GetItemOutput, GetItemRequest,
    IndexSchema, Item, KeySchema, KeysAndAttributes, PutItemOutput, PutItemRequest, QueryOutput,
    QueryRequest, ScanOutput, ScanRequest, TableSchema, TransactWriteItemsOutput,
    TransactWriteItemsRequest, UpdateItemOutput, UpdateItemRequest, WriteRequest,
};
use tablecache::{MemoryTableStore, RemoteError, Result, TableStore};

// == Recording Store ==
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryTableStore,
    calls: Mutex<Vec<String>>,
    batch_gets: Mutex<Vec<BatchGetItemRequest>>,
    /// `id` values whose sub-operations are reported unprocessed
    withheld: Mutex<HashSet<String>>,
    describe_delay: Mutex<Duration>,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the `users` and `orders` tables.
    pub async fn with_tables() -> Self {
        let store = Self::new();
        store.inner.create_table(users_schema()).await.unwrap();
        store.inner.create_table(orders_schema()).await.unwrap();
        store
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.batch_gets.lock().unwrap().clear();
    }

    pub fn batch_gets(&self) -> Vec<BatchGetItemRequest> {
        self.batch_gets.lock().unwrap().clone()
    }

    pub fn withhold(&self, id: &str) {
        self.withheld.lock().unwrap().insert(id.to_string());
    }

    pub fn release_all(&self) {
        self.withheld.lock().unwrap().clear();
    }

    pub fn set_describe_delay(&self, delay: Duration) {
        *self.describe_delay.lock().unwrap() = delay;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn is_withheld(&self, item: &Item) -> bool {
        match item.get("id") {
            Some(AttributeValue::S(id)) => self.withheld.lock().unwrap().contains(id),
            _ => false,
        }
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("injected failure".to_string()).into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TableStore for RecordingStore {
    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        self.record("describe_table");
        let delay = *self.describe_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.inner.describe_table(table).await
    }

    async fn get_item(&self, req: GetItemRequest) -> Result<GetItemOutput> {
        self.record("get_item");
        self.inner.get_item(req).await
    }

    async fn put_item(&self, req: PutItemRequest) -> Result<PutItemOutput> {
        self.record("put_item");
        self.check_writes()?;
        self.inner.put_item(req).await
    }

    async fn delete_item(&self, req: DeleteItemRequest) -> Result<DeleteItemOutput> {
        self.record("delete_item");
        self.check_writes()?;
        self.inner.delete_item(req).await
    }

    async fn update_item(&self, req: UpdateItemRequest) -> Result<UpdateItemOutput> {
        self.record("update_item");
        self.check_writes()?;
        self.inner.update_item(req).await
    }

    async fn batch_get_item(&self, req: BatchGetItemRequest) -> Result<BatchGetItemOutput> {
        self.record("batch_get_item");
        self.batch_gets.lock().unwrap().push(req.clone());

        let mut forward = BatchGetItemRequest::default();
        let mut unprocessed: BTreeMap<String, KeysAndAttributes> = BTreeMap::new();
        for (table, kaa) in req.request_items {
            let (held, sent): (Vec<Item>, Vec<Item>) =
                kaa.keys.iter().cloned().partition(|k| self.is_withheld(k));
            if !held.is_empty() {
                unprocessed.insert(
                    table.clone(),
                    KeysAndAttributes {
                        keys: held,
                        ..kaa.clone()
                    },
                );
            }
            if !sent.is_empty() {
                forward
                    .request_items
                    .insert(table, KeysAndAttributes { keys: sent, ..kaa });
            }
        }

        let mut out = if forward.request_items.is_empty() {
            BatchGetItemOutput::default()
        } else {
            self.inner.batch_get_item(forward).await?
        };
        out.unprocessed_keys = unprocessed;
        Ok(out)
    }

    async fn batch_write_item(&self, req: BatchWriteItemRequest) -> Result<BatchWriteItemOutput> {
        self.record("batch_write_item");
        self.check_writes()?;

        let mut forward = BatchWriteItemRequest::default();
        let mut unprocessed: BTreeMap<String, Vec<WriteRequest>> = BTreeMap::new();
        for (table, writes) in req.request_items {
            for write in writes {
                let image = match &write {
                    WriteRequest::Put(put) => &put.item,
                    WriteRequest::Delete(delete) => &delete.key,
                };
                if self.is_withheld(image) {
                    unprocessed.entry(table.clone()).or_default().push(write);
                } else {
                    forward
                        .request_items
                        .entry(table.clone())
                        .or_default()
                        .push(write);
                }
            }
        }

        if !forward.request_items.is_empty() {
            self.inner.batch_write_item(forward).await?;
        }
        Ok(BatchWriteItemOutput {
            unprocessed_items: unprocessed,
        })
    }

    async fn transact_write_items(
        &self,
        req: TransactWriteItemsRequest,
    ) -> Result<TransactWriteItemsOutput> {
        self.record("transact_write_items");
        self.check_writes()?;
        self.inner.transact_write_items(req).await
    }

    async fn query(&self, req: QueryRequest) -> Result<QueryOutput> {
        self.record("query");
        self.inner.query(req).await
    }

    async fn scan(&self, req: ScanRequest) -> Result<ScanOutput> {
        self.record("scan");
        self.inner.scan(req).await
    }
}

// == Fixtures ==

/// `users`: hash key `id`; `by_email` on `email`; `by_team` on `team` + `name`.
pub fn users_schema() -> TableSchema {
    TableSchema::new("users", KeySchema::new("id", None))
        .with_global_index(IndexSchema::new("by_email", KeySchema::new("email", None)))
        .with_global_index(IndexSchema::new(
            "by_team",
            KeySchema::new("team", Some("name")),
        ))
}

/// `orders`: hash key `customer`, range key `order_id`; local index `by_placed`.
pub fn orders_schema() -> TableSchema {
    TableSchema::new("orders", KeySchema::new("customer", Some("order_id"))).with_local_index(
        IndexSchema::new("by_placed", KeySchema::new("customer", Some("placed"))),
    )
}

pub fn item(pairs: &[(&str, AttributeValue)]) -> Item {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn user_key(id: &str) -> Item {
    item(&[("id", id.into())])
}

pub fn user(id: &str, name: &str, team: &str) -> Item {
    item(&[
        ("id", id.into()),
        ("name", name.into()),
        ("team", team.into()),
        ("email", format!("{}@example.com", id).into()),
    ])
}

pub fn order_key(customer: &str, order_id: i64) -> Item {
    item(&[("customer", customer.into()), ("order_id", order_id.into())])
}

pub fn order(customer: &str, order_id: i64, placed: i64) -> Item {
    item(&[
        ("customer", customer.into()),
        ("order_id", order_id.into()),
        ("placed", placed.into()),
    ])
}
