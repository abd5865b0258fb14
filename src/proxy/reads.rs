//! Cached read paths: point reads, batch reads, queries and scans.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::CachedTableStore;
use crate::backend::TableStore;
use crate::cache::Cached;
use crate::error::Result;
use crate::keys::{item_key, query_group, query_shape, scan_shape, GroupKey};
use crate::models::{
    BatchGetItemOutput, BatchGetItemRequest, GetItemOutput, GetItemRequest, KeysAndAttributes,
    QueryOutput, QueryRequest, ScanOutput, ScanRequest, TableSchema,
};

impl<S: TableStore> CachedTableStore<S> {
    // == Get Item ==
    pub(crate) async fn read_item(&self, req: GetItemRequest) -> Result<GetItemOutput> {
        // A projected item is not a full item and cannot be cached as one.
        if req.projection_expression.is_some() || !self.is_allowed(&req.table_name).await {
            return self.inner.get_item(req).await;
        }

        let schema = self.schema_of(&req.table_name).await?;
        let key = item_key(&schema.table_name, &req.key, &schema.key_schema)?;

        if !req.consistent_read {
            if let Some(cached) = self.lookup_item("get_item", &key).await {
                return Ok(GetItemOutput {
                    item: cached.into_option(),
                });
            }
        }

        let out = self.inner.get_item(req).await?;
        self.cache_item("get_item", key, out.item.clone().into())
            .await;
        Ok(out)
    }

    // == Batch Get Item ==
    /// Serves what it can from the item cache and sends one batch read for
    /// the rest.
    pub(crate) async fn read_batch(&self, req: BatchGetItemRequest) -> Result<BatchGetItemOutput> {
        let mut output = BatchGetItemOutput::default();
        let mut forward = BatchGetItemRequest::default();
        let mut cached_tables: HashMap<String, Arc<TableSchema>> = HashMap::new();
        // Item keys sent to the store for cached tables
        let mut requested: Vec<String> = Vec::new();

        for (table, kaa) in req.request_items {
            if kaa.projection_expression.is_some() || !self.is_allowed(&table).await {
                forward.request_items.insert(table, kaa);
                continue;
            }

            let schema = self.schema_of(&table).await?;
            let KeysAndAttributes {
                keys,
                consistent_read,
                projection_expression,
                expression_attribute_names,
            } = kaa;

            let mut misses = Vec::new();
            for key in keys {
                let cache_key = item_key(&table, &key, &schema.key_schema)?;
                if !consistent_read {
                    match self.lookup_item("batch_get_item", &cache_key).await {
                        Some(Cached::Present(item)) => {
                            output.responses.entry(table.clone()).or_default().push(item);
                            continue;
                        }
                        Some(Cached::Absent) => continue,
                        None => {}
                    }
                }
                requested.push(cache_key);
                misses.push(key);
            }

            if !misses.is_empty() {
                forward.request_items.insert(
                    table.clone(),
                    KeysAndAttributes {
                        keys: misses,
                        consistent_read,
                        projection_expression,
                        expression_attribute_names,
                    },
                );
            }
            cached_tables.insert(table, schema);
        }

        if forward.request_items.is_empty() {
            return Ok(output);
        }

        let remote = self.inner.batch_get_item(forward).await?;

        let mut resolved: HashSet<String> = HashSet::new();
        for (table, items) in &remote.unprocessed_keys {
            if let Some(schema) = cached_tables.get(table) {
                for key in &items.keys {
                    resolved.insert(item_key(table, key, &schema.key_schema)?);
                }
            }
        }

        for (table, items) in remote.responses {
            let schema = cached_tables.get(&table);
            let found = output.responses.entry(table.clone()).or_default();
            for item in items {
                if let Some(schema) = schema {
                    let key = item_key(&table, &item, &schema.key_schema)?;
                    self.cache_item("batch_get_item", key.clone(), Cached::Present(item.clone()))
                        .await;
                    resolved.insert(key);
                }
                found.push(item);
            }
        }

        // Requested, not returned and not left unprocessed: the item does not exist.
        for key in requested.into_iter().filter(|k| !resolved.contains(k)) {
            self.cache_item("batch_get_item", key, Cached::Absent).await;
        }

        output.unprocessed_keys = remote.unprocessed_keys;
        Ok(output)
    }

    // == Query ==
    pub(crate) async fn read_query(&self, req: QueryRequest) -> Result<QueryOutput> {
        if !self.is_allowed(&req.table_name).await {
            return self.inner.query(req).await;
        }

        let schema = self.schema_of(&req.table_name).await?;
        let group = query_group(&schema, &req)?;
        let shape = query_shape(&schema, &req)?;

        if !req.consistent_read {
            let found = self.queries.write().await.get(&group, &shape);
            self.note(if found.is_some() { "hit" } else { "miss" }, "query", &group);
            if let Some(out) = found {
                return Ok(out);
            }
        }

        let out = self.inner.query(req).await?;
        self.note("set", "query", &group);
        self.queries
            .write()
            .await
            .set(group, shape, out.clone(), self.settings.query_ttl);
        Ok(out)
    }

    // == Scan ==
    pub(crate) async fn read_scan(&self, req: ScanRequest) -> Result<ScanOutput> {
        if !self.is_allowed(&req.table_name).await {
            return self.inner.scan(req).await;
        }

        let schema = self.schema_of(&req.table_name).await?;
        let group = GroupKey::scan(&schema.table_name, req.index_name.as_deref());
        let shape = scan_shape(&schema, &req)?;

        if !req.consistent_read {
            let found = self.scans.write().await.get(&group, &shape);
            self.note(if found.is_some() { "hit" } else { "miss" }, "scan", &group);
            if let Some(out) = found {
                return Ok(out);
            }
        }

        let out = self.inner.scan(req).await?;
        self.note("set", "scan", &group);
        self.scans
            .write()
            .await
            .set(group, shape, out.clone(), self.settings.scan_ttl);
        Ok(out)
    }
}
