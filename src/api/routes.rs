//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    allow_handler, batch_get_item_handler, batch_write_item_handler, create_table_handler,
    debug_handler, delete_item_handler, describe_table_handler, get_item_handler,
    health_handler, purge_handler, put_item_handler, query_handler, scan_handler,
    stats_handler, transact_write_items_handler, update_item_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Per-store statistics and hit ratio
/// - `POST /purge` - Empty every cache
/// - `PUT /allow/:table` - Add a table to the allow-list
/// - `PUT /debug` - Toggle debug logging of cache decisions
/// - `POST /tables`, `GET /tables/:table` - Create and describe tables
/// - `POST /get-item`, `/put-item`, `/delete-item`, `/update-item`,
///   `/batch-get-item`, `/batch-write-item`, `/transact-write-items`,
///   `/query`, `/scan` - Table operations through the cache
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/purge", post(purge_handler))
        .route("/allow/:table", put(allow_handler))
        .route("/debug", put(debug_handler))
        .route("/tables", post(create_table_handler))
        .route("/tables/:table", get(describe_table_handler))
        .route("/get-item", post(get_item_handler))
        .route("/put-item", post(put_item_handler))
        .route("/delete-item", post(delete_item_handler))
        .route("/update-item", post(update_item_handler))
        .route("/batch-get-item", post(batch_get_item_handler))
        .route("/batch-write-item", post(batch_write_item_handler))
        .route("/transact-write-items", post(transact_write_items_handler))
        .route("/query", post(query_handler))
        .route("/scan", post(scan_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
