//! API Module
//!
//! HTTP handlers and routing for the record cache REST API.
//!
//! # Endpoints
//! - `GET /records` - List every stored record
//! - `GET /records/:key` - Fetch a record, creating it unless `create=false`
//! - `PATCH /records/:key` - Merge a partial update into a record
//! - `DELETE /records/:key` - Evict a record (`cache_only=true` keeps it stored)
//! - `POST /records/:key/actions/:action` - Perform a gated action
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
