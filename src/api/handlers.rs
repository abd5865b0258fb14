//! API Handlers
//!
//! HTTP request handlers for the administrative endpoints and for every
//! table store operation exposed through the cache.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::backend::{MemoryTableStore, TableStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    BatchGetItemOutput, BatchGetItemRequest, BatchWriteItemOutput, BatchWriteItemRequest,
    DebugRequest, DeleteItemOutput, DeleteItemRequest, GetItemOutput, GetItemRequest,
    HealthResponse, MessageResponse, PutItemOutput, PutItemRequest, QueryOutput, QueryRequest,
    ScanOutput, ScanRequest, StatsResponse, TableSchema, TransactWriteItemsOutput,
    TransactWriteItemsRequest, UpdateItemOutput, UpdateItemRequest,
};
use crate::proxy::{CachedTableStore, ProxySettings};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Caching proxy over the in-memory table store
    pub cache: Arc<CachedTableStore<MemoryTableStore>>,
}

impl AppState {
    /// Creates a new AppState around a backing store.
    pub fn new(store: MemoryTableStore, settings: ProxySettings) -> Self {
        Self {
            cache: Arc::new(CachedTableStore::new(store, settings)),
        }
    }

    /// Creates a new AppState from configuration, with an empty store.
    pub fn from_config(config: &Config) -> Self {
        Self::new(MemoryTableStore::new(), config.proxy_settings())
    }
}

/// Decodes a request body. Malformed attribute values surface as encoding
/// faults rather than generic extractor rejections.
fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| CacheError::Encoding(e.to_string()))
}

// == Administrative Endpoints ==

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
///
/// Returns per-store statistics and the cumulative hit ratio.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await)
}

/// Handler for POST /purge
pub async fn purge_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.cache.purge_all().await;
    Json(MessageResponse::new("All caches purged"))
}

/// Handler for PUT /allow/:table
pub async fn allow_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<MessageResponse>> {
    if table.trim().is_empty() {
        return Err(CacheError::InvalidRequest("Table name cannot be empty".to_string()));
    }
    state.cache.allow(&table).await;
    Ok(Json(MessageResponse::new(format!(
        "Caching enabled for table '{}'",
        table
    ))))
}

/// Handler for PUT /debug
pub async fn debug_handler(
    State(state): State<AppState>,
    Json(req): Json<DebugRequest>,
) -> Json<MessageResponse> {
    state.cache.set_debug(req.enabled);
    Json(MessageResponse::new(format!(
        "Debug logging {}",
        if req.enabled { "enabled" } else { "disabled" }
    )))
}

/// Handler for POST /tables
///
/// Creates a table in the backing store.
pub async fn create_table_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<TableSchema>> {
    let schema: TableSchema = decode(body)?;
    state.cache.inner().create_table(schema.clone()).await?;
    info!("Created table {}", schema.table_name);
    Ok(Json(schema))
}

/// Handler for GET /tables/:table
///
/// Describes a table through the schema cache.
pub async fn describe_table_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<TableSchema>> {
    Ok(Json(state.cache.describe_table(&table).await?))
}

// == Table Operations ==

/// Handler for POST /get-item
pub async fn get_item_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<GetItemOutput>> {
    let req: GetItemRequest = decode(body)?;
    Ok(Json(state.cache.get_item(req).await?))
}

/// Handler for POST /put-item
pub async fn put_item_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<PutItemOutput>> {
    let req: PutItemRequest = decode(body)?;
    Ok(Json(state.cache.put_item(req).await?))
}

/// Handler for POST /delete-item
pub async fn delete_item_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<DeleteItemOutput>> {
    let req: DeleteItemRequest = decode(body)?;
    Ok(Json(state.cache.delete_item(req).await?))
}

/// Handler for POST /update-item
pub async fn update_item_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<UpdateItemOutput>> {
    let req: UpdateItemRequest = decode(body)?;
    Ok(Json(state.cache.update_item(req).await?))
}

/// Handler for POST /batch-get-item
pub async fn batch_get_item_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<BatchGetItemOutput>> {
    let req: BatchGetItemRequest = decode(body)?;
    Ok(Json(state.cache.batch_get_item(req).await?))
}

/// Handler for POST /batch-write-item
pub async fn batch_write_item_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<BatchWriteItemOutput>> {
    let req: BatchWriteItemRequest = decode(body)?;
    Ok(Json(state.cache.batch_write_item(req).await?))
}

/// Handler for POST /transact-write-items
pub async fn transact_write_items_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<TransactWriteItemsOutput>> {
    let req: TransactWriteItemsRequest = decode(body)?;
    Ok(Json(state.cache.transact_write_items(req).await?))
}

/// Handler for POST /query
pub async fn query_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<QueryOutput>> {
    let req: QueryRequest = decode(body)?;
    Ok(Json(state.cache.query(req).await?))
}

/// Handler for POST /scan
pub async fn scan_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ScanOutput>> {
    let req: ScanRequest = decode(body)?;
    Ok(Json(state.cache.scan(req).await?))
}
