//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_group_handler, delete_handler, export_handler, get_handler, group_stats_handler,
    health_handler, optimize_handler, set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a value (optional ttl, group, tier, metadata)
/// - `GET /get/:key` - Read through the tiers (`?group=` joins a group)
/// - `DELETE /del/:key` - Delete a key from every tier
/// - `GET /group/:name` - Group membership and liveness
/// - `DELETE /group/:name` - Delete every key of a group
/// - `GET /stats` - Aggregate and per-tier statistics
/// - `GET /export` - Loaded configuration, statistics and group names
/// - `POST /optimize` - Clear cold tiers and prune groups
/// - `GET /health` - Health check endpoint
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

    // Build router with all endpoints
    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route(
            "/group/:name",
            get(group_stats_handler).delete(delete_group_handler),
        )
        .route("/stats", get(stats_handler))
        .route("/export", get(export_handler))
        .route("/optimize", post(optimize_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
