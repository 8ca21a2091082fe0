//! API Module
//!
//! HTTP handlers and routing for the tiered cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a value
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `GET /group/:name`, `DELETE /group/:name` - Group stats and invalidation
//! - `GET /stats` - Get cache statistics
//! - `GET /export` - Export configuration, statistics and groups
//! - `POST /optimize` - Run the optimize pass
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
