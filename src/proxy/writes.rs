//! Cached write paths
//!
//! Every successful write updates the item cache for the keys it touched and
//! purges the query and scan groups the old and new images can appear in.
//! Failed writes leave the caches alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{CachedTableStore, PrefetchSet, Snapshot};
use crate::backend::TableStore;
use crate::cache::Cached;
use crate::error::Result;
use crate::keys::item_key;
use crate::models::{
    assigned_image, BatchWriteItemOutput, BatchWriteItemRequest, DeleteItemOutput,
    DeleteItemRequest, Item, PutItemOutput, PutItemRequest, ReturnValues, TableSchema,
    TransactWriteItem, TransactWriteItemsOutput, TransactWriteItemsRequest, UpdateItemOutput,
    UpdateItemRequest, WriteRequest,
};

impl<S: TableStore> CachedTableStore<S> {
    /// Swaps `ReturnValues::None` for `image` when upgrading is on. Returns
    /// whether the swap happened, so the extra image can be stripped later.
    fn upgrade(&self, return_values: &mut ReturnValues, image: ReturnValues) -> bool {
        let upgrade = self.settings.upgrade_return_values && *return_values == ReturnValues::None;
        if upgrade {
            *return_values = image;
        }
        upgrade
    }

    // == Put Item ==
    pub(crate) async fn write_put(&self, mut req: PutItemRequest) -> Result<PutItemOutput> {
        if !self.is_allowed(&req.table_name).await {
            return self.inner.put_item(req).await;
        }

        let schema = self.schema_of(&req.table_name).await?;
        let key = item_key(&schema.table_name, &req.item, &schema.key_schema)?;
        let upgraded = self.upgrade(&mut req.return_values, ReturnValues::AllOld);

        // Without the old image, only a prefetch can name the index groups
        // an overwritten item leaves.
        let mut prefetch = PrefetchSet::new();
        if req.return_values != ReturnValues::AllOld && schema.has_secondary_indexes() {
            prefetch.add(&schema, &req.item)?;
        }
        let images = self.prefetch("put_item", prefetch).await?;

        let item = req.item.clone();
        let mut out = self.inner.put_item(req).await?;

        self.invalidate("put_item", &schema, Snapshot::Full(&item))
            .await?;
        if let Some(old) = &out.attributes {
            self.invalidate("put_item", &schema, Snapshot::Full(old))
                .await?;
        }
        self.replay("put_item", &images, &HashSet::new()).await?;
        self.cache_item("put_item", key, Cached::Present(item)).await;

        if upgraded {
            out.attributes = None;
        }
        Ok(out)
    }

    // == Delete Item ==
    pub(crate) async fn write_delete(&self, mut req: DeleteItemRequest) -> Result<DeleteItemOutput> {
        if !self.is_allowed(&req.table_name).await {
            return self.inner.delete_item(req).await;
        }

        let schema = self.schema_of(&req.table_name).await?;
        let key = item_key(&schema.table_name, &req.key, &schema.key_schema)?;
        let upgraded = self.upgrade(&mut req.return_values, ReturnValues::AllOld);
        let returns_old = req.return_values == ReturnValues::AllOld;

        let mut prefetch = PrefetchSet::new();
        if !returns_old {
            prefetch.add(&schema, &req.key)?;
        }
        let images = self.prefetch("delete_item", prefetch).await?;

        let request_key = req.key.clone();
        let mut out = self.inner.delete_item(req).await?;

        match &out.attributes {
            Some(old) => {
                self.invalidate("delete_item", &schema, Snapshot::Full(old))
                    .await?
            }
            // Asked for the old image and got none: nothing was deleted.
            None if returns_old => {}
            // Index groups were covered by the prefetch.
            None => {
                self.invalidate("delete_item", &schema, Snapshot::Full(&request_key))
                    .await?
            }
        }
        self.replay("delete_item", &images, &HashSet::new()).await?;
        self.cache_item("delete_item", key, Cached::Absent).await;

        if upgraded {
            out.attributes = None;
        }
        Ok(out)
    }

    // == Update Item ==
    pub(crate) async fn write_update(&self, mut req: UpdateItemRequest) -> Result<UpdateItemOutput> {
        if !self.is_allowed(&req.table_name).await {
            return self.inner.update_item(req).await;
        }

        let schema = self.schema_of(&req.table_name).await?;
        let key = item_key(&schema.table_name, &req.key, &schema.key_schema)?;
        let upgraded = self.upgrade(&mut req.return_values, ReturnValues::AllNew);
        let returns_new = req.return_values == ReturnValues::AllNew;

        // The new image cannot name the index groups the item moves out of.
        let mut prefetch = PrefetchSet::new();
        if !returns_new || schema.has_secondary_indexes() {
            prefetch.add(&schema, &req.key)?;
        }
        let images = self.prefetch("update_item", prefetch).await?;

        let assigned = assigned_image(&req.key, &req.attribute_updates);
        let mut out = self.inner.update_item(req).await?;

        let new_image = out.attributes.as_ref().filter(|_| returns_new).cloned();
        match &new_image {
            Some(new) => {
                self.invalidate("update_item", &schema, Snapshot::Full(new))
                    .await?
            }
            None => {
                self.evict_item("update_item", &key).await;
                self.invalidate("update_item", &schema, Snapshot::Full(&assigned))
                    .await?;
            }
        }
        self.replay("update_item", &images, &HashSet::new()).await?;
        if let Some(new) = new_image {
            self.cache_item("update_item", key, Cached::Present(new)).await;
        }

        if upgraded {
            out.attributes = None;
        }
        Ok(out)
    }

    // == Batch Write Item ==
    pub(crate) async fn write_batch(&self, req: BatchWriteItemRequest) -> Result<BatchWriteItemOutput> {
        let mut schemas: HashMap<String, Arc<TableSchema>> = HashMap::new();
        let mut writes: Vec<(Arc<TableSchema>, String, WriteRequest)> = Vec::new();
        let mut prefetch = PrefetchSet::new();

        for (table, requests) in &req.request_items {
            if !self.is_allowed(table).await {
                continue;
            }
            let schema = self.schema_of(table).await?;
            for write in requests {
                let image = match write {
                    WriteRequest::Put(put) => &put.item,
                    WriteRequest::Delete(delete) => &delete.key,
                };
                let key = item_key(table, image, &schema.key_schema)?;
                prefetch.add(&schema, image)?;
                writes.push((schema.clone(), key, write.clone()));
            }
            schemas.insert(table.clone(), schema);
        }

        let images = self.prefetch("batch_write_item", prefetch).await?;
        let out = self.inner.batch_write_item(req).await?;

        // Sub-operations the store did not apply keep their cached state.
        let mut unprocessed = HashSet::new();
        for (table, requests) in &out.unprocessed_items {
            let Some(schema) = schemas.get(table) else {
                continue;
            };
            for write in requests {
                let image = match write {
                    WriteRequest::Put(put) => &put.item,
                    WriteRequest::Delete(delete) => &delete.key,
                };
                unprocessed.insert(item_key(table, image, &schema.key_schema)?);
            }
        }

        for (schema, key, write) in writes {
            if unprocessed.contains(&key) {
                continue;
            }
            match write {
                WriteRequest::Put(put) => {
                    self.invalidate("batch_write_item", &schema, Snapshot::Full(&put.item))
                        .await?;
                    self.cache_item("batch_write_item", key, Cached::Present(put.item))
                        .await;
                }
                WriteRequest::Delete(delete) => {
                    self.invalidate("batch_write_item", &schema, Snapshot::Full(&delete.key))
                        .await?;
                    self.cache_item("batch_write_item", key, Cached::Absent)
                        .await;
                }
            }
        }
        self.replay("batch_write_item", &images, &unprocessed).await?;
        Ok(out)
    }

    // == Transact Write Items ==
    pub(crate) async fn write_transaction(
        &self,
        req: TransactWriteItemsRequest,
    ) -> Result<TransactWriteItemsOutput> {
        const OP: &str = "transact_write_items";
        let mut writes: Vec<(Arc<TableSchema>, String, TransactWriteItem)> = Vec::new();
        let mut prefetch = PrefetchSet::new();

        for op in &req.transact_items {
            let table = op.table_name();
            if !self.is_allowed(table).await {
                continue;
            }
            let schema = self.schema_of(table).await?;
            let image: &Item = match op {
                TransactWriteItem::Put(put) => &put.item,
                TransactWriteItem::Delete(delete) => &delete.key,
                TransactWriteItem::Update(update) => &update.key,
            };
            let key = item_key(table, image, &schema.key_schema)?;
            prefetch.add(&schema, image)?;
            writes.push((schema, key, op.clone()));
        }

        let images = self.prefetch(OP, prefetch).await?;
        let out = self.inner.transact_write_items(req).await?;

        for (schema, key, op) in writes {
            match op {
                TransactWriteItem::Put(put) => {
                    self.invalidate(OP, &schema, Snapshot::Full(&put.item)).await?;
                    self.cache_item(OP, key, Cached::Present(put.item)).await;
                }
                TransactWriteItem::Delete(delete) => {
                    self.invalidate(OP, &schema, Snapshot::Full(&delete.key)).await?;
                    self.cache_item(OP, key, Cached::Absent).await;
                }
                TransactWriteItem::Update(update) => {
                    self.evict_item(OP, &key).await;
                    let assigned = assigned_image(&update.key, &update.attribute_updates);
                    self.invalidate(OP, &schema, Snapshot::Full(&assigned)).await?;
                }
            }
        }
        self.replay(OP, &images, &HashSet::new()).await?;
        Ok(out)
    }
}
