//! Table Store Backends
//!
//! The `TableStore` trait is the operation set of the remote table store.
//! The caching decorator both consumes and implements it, so a cached store
//! can stand in wherever a raw one is used.

mod memory;

pub use memory::MemoryTableStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    BatchGetItemOutput, BatchGetItemRequest, BatchWriteItemOutput, BatchWriteItemRequest,
    DeleteItemOutput, DeleteItemRequest, GetItemOutput, GetItemRequest, PutItemOutput,
    PutItemRequest, QueryOutput, QueryRequest, ScanOutput, ScanRequest, TableSchema,
    TransactWriteItemsOutput, TransactWriteItemsRequest, UpdateItemOutput, UpdateItemRequest,
};

// == Table Store ==
/// Operations offered by a schema-described table store.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Key schema and secondary indexes of a table.
    async fn describe_table(&self, table: &str) -> Result<TableSchema>;

    async fn get_item(&self, req: GetItemRequest) -> Result<GetItemOutput>;

    async fn put_item(&self, req: PutItemRequest) -> Result<PutItemOutput>;

    async fn delete_item(&self, req: DeleteItemRequest) -> Result<DeleteItemOutput>;

    async fn update_item(&self, req: UpdateItemRequest) -> Result<UpdateItemOutput>;

    /// Point reads across tables. Keys the store could not serve come back
    /// in `unprocessed_keys`.
    async fn batch_get_item(&self, req: BatchGetItemRequest) -> Result<BatchGetItemOutput>;

    /// Puts and deletes across tables. Sub-operations that did not happen
    /// come back in `unprocessed_items`.
    async fn batch_write_item(&self, req: BatchWriteItemRequest) -> Result<BatchWriteItemOutput>;

    /// All-or-nothing writes.
    async fn transact_write_items(
        &self,
        req: TransactWriteItemsRequest,
    ) -> Result<TransactWriteItemsOutput>;

    async fn query(&self, req: QueryRequest) -> Result<QueryOutput>;

    async fn scan(&self, req: ScanRequest) -> Result<ScanOutput>;
}

#[async_trait]
impl<T: TableStore + ?Sized> TableStore for Arc<T> {
    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        (**self).describe_table(table).await
    }

    async fn get_item(&self, req: GetItemRequest) -> Result<GetItemOutput> {
        (**self).get_item(req).await
    }

    async fn put_item(&self, req: PutItemRequest) -> Result<PutItemOutput> {
        (**self).put_item(req).await
    }

    async fn delete_item(&self, req: DeleteItemRequest) -> Result<DeleteItemOutput> {
        (**self).delete_item(req).await
    }

    async fn update_item(&self, req: UpdateItemRequest) -> Result<UpdateItemOutput> {
        (**self).update_item(req).await
    }

    async fn batch_get_item(&self, req: BatchGetItemRequest) -> Result<BatchGetItemOutput> {
        (**self).batch_get_item(req).await
    }

    async fn batch_write_item(&self, req: BatchWriteItemRequest) -> Result<BatchWriteItemOutput> {
        (**self).batch_write_item(req).await
    }

    async fn transact_write_items(
        &self,
        req: TransactWriteItemsRequest,
    ) -> Result<TransactWriteItemsOutput> {
        (**self).transact_write_items(req).await
    }

    async fn query(&self, req: QueryRequest) -> Result<QueryOutput> {
        (**self).query(req).await
    }

    async fn scan(&self, req: ScanRequest) -> Result<ScanOutput> {
        (**self).scan(req).await
    }
}
