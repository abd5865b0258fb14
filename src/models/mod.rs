//! Data model shared by the cache, the backend and the HTTP API
//!
//! Values, schemas, and the request/response shapes of every table store
//! operation.

pub mod requests;
pub mod responses;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use requests::{
    assigned_image, AttributeAction, BatchGetItemRequest, BatchWriteItemRequest,
    ComparisonOperator, Condition, DebugRequest, DeleteItemRequest, DeleteRequest,
    GetItemRequest, KeysAndAttributes, PutItemRequest, PutRequest, QueryRequest, ReturnValues,
    ScanRequest, Select, TransactDelete, TransactPut, TransactUpdate, TransactWriteItem,
    TransactWriteItemsRequest, UpdateItemRequest, WriteRequest,
};
pub use responses::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, HealthResponse,
    MessageResponse, PutItemOutput, QueryOutput, ScanOutput, StatsResponse,
    TransactWriteItemsOutput, UpdateItemOutput,
};
pub use schema::{IndexSchema, KeySchema, TableSchema};
pub use value::{AttributeValue, Item};
