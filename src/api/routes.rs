//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    command_handler, create_handler, delete_handler, flush_handler, health_handler, info_handler,
    list_handler, meta_handler, stats_handler, test_handler, value_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /caches` - Create a cache definition
/// - `GET /caches` - List cache names
/// - `GET /caches/:name` - Describe a cache definition
/// - `DELETE /caches/:name` - Delete a definition and flush its keys
/// - `GET /caches/:name/test` - Ping the definition's store handle
/// - `POST /caches/:name/flush` - Remove every key under the cache
/// - `POST /caches/:name/value` - Rows for a query
/// - `POST /caches/:name/meta` - Schema for a query
/// - `POST /command` - Argv-style command
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/caches", post(create_handler).get(list_handler))
        .route("/caches/:name", get(info_handler).delete(delete_handler))
        .route("/caches/:name/test", get(test_handler))
        .route("/caches/:name/flush", post(flush_handler))
        .route("/caches/:name/value", post(value_handler))
        .route("/caches/:name/meta", post(meta_handler))
        .route("/command", post(command_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
