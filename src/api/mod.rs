//! API Module
//!
//! HTTP handlers and routing for the table cache REST API.
//!
//! # Endpoints
//! - Administration: `/health`, `/stats`, `/purge`, `/allow/:table`, `/debug`
//! - Tables: `/tables`, `/tables/:table`
//! - Operations: `/get-item`, `/put-item`, `/delete-item`, `/update-item`,
//!   `/batch-get-item`, `/batch-write-item`, `/transact-write-items`, `/query`, `/scan`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
