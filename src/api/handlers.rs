//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::sync::RwLock;

use super::command::{self, Command, CommandReply};
use crate::backend::Connector;
use crate::config::Config;
use crate::engine::{CacheEngine, CacheInfo};
use crate::error::{CacheError, Result};
use crate::kv::KvStore;
use crate::models::{
    CommandRequest, CreateCacheRequest, DeleteResponse, FlushResponse, HealthResponse,
    ListResponse, MetaResponse, QueryRequest, StatsResponse, TestResponse, ValueResponse,
};

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: CacheEngine,
}

impl AppState {
    pub fn new(engine: CacheEngine) -> Self {
        Self { engine }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds an empty key-value store and an engine that opens backing-store
    /// connections through `connector`.
    pub fn from_config(config: &Config, connector: Arc<dyn Connector>) -> Self {
        let kv = Arc::new(RwLock::new(KvStore::new()));
        Self::new(CacheEngine::new(connector, kv, config))
    }

    /// Shared key-value store, for the cleanup task.
    pub fn kv(&self) -> Arc<RwLock<KvStore>> {
        self.engine.kv()
    }
}

/// Handler for POST /caches
pub async fn create_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateCacheRequest>,
) -> Result<(StatusCode, Json<CacheInfo>)> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let info = state.engine.create(req.into_definition()).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// Handler for GET /caches
pub async fn list_handler(State(state): State<AppState>) -> Json<ListResponse> {
    Json(ListResponse {
        caches: state.engine.list(),
    })
}

/// Handler for GET /caches/:name
pub async fn info_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CacheInfo>> {
    Ok(Json(state.engine.info(&name)?))
}

/// Handler for GET /caches/:name/test
pub async fn test_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TestResponse>> {
    let alive = state.engine.test(&name).await?;
    Ok(Json(TestResponse { name, alive }))
}

/// Handler for POST /caches/:name/flush
pub async fn flush_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FlushResponse>> {
    let removed = state.engine.flush(&name).await?;
    Ok(Json(FlushResponse { name, removed }))
}

/// Handler for DELETE /caches/:name
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.engine.delete(&name).await?;
    Ok(Json(DeleteResponse::new(name, removed)))
}

/// Handler for POST /caches/:name/value
///
/// Returns the cached rows for the query, populating them on a miss.
pub async fn value_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ValueResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let rows = state.engine.get_value(&name, &req.query).await?;
    Ok(Json(ValueResponse {
        name,
        query: req.query,
        rows,
    }))
}

/// Handler for POST /caches/:name/meta
pub async fn meta_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<MetaResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let columns = state.engine.get_meta(&name, &req.query).await?;
    Ok(Json(MetaResponse {
        name,
        query: req.query,
        columns,
    }))
}

/// Handler for POST /command
///
/// Argv-style entry point for every administrative operation.
pub async fn command_handler(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandReply>> {
    let command = Command::parse(&req.args)?;
    Ok(Json(command::execute(&state.engine, command).await?))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.engine.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
