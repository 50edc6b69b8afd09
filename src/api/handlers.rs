//! API Handlers
//!
//! HTTP request handlers for the record and action endpoints. Every handler
//! that names a key marks it live in the session tracker, so the sweeper
//! leaves keys with recent traffic cached.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::actions::{ActionProcessor, ActionRegistry};
use crate::cache::RecordCache;
use crate::config::Config;
use crate::error::{RecordError, Result};
use crate::models::{
    validate_key, ActionResponse, EvictQuery, EvictResponse, HealthResponse, PerformRequest,
    RecordListResponse, RecordQuery, StatsResponse,
};
use crate::record::{EntityRecord, RecordPatch};
use crate::session::SessionTracker;
use crate::store::RecordStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RecordCache>,
    pub processor: ActionProcessor,
    pub actions: Arc<ActionRegistry>,
    pub sessions: Arc<SessionTracker>,
}

impl AppState {
    pub fn new(
        cache: Arc<RecordCache>,
        actions: ActionRegistry,
        sessions: Arc<SessionTracker>,
    ) -> Self {
        Self {
            processor: ActionProcessor::new(cache.clone()),
            cache,
            actions: Arc::new(actions),
            sessions,
        }
    }

    /// Creates a new AppState from configuration over the given store.
    pub fn from_config(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        let cache = Arc::new(RecordCache::from_config(store, config));
        let sessions = Arc::new(SessionTracker::new(config.session_ttl()));
        Self::new(cache, config.registry(), sessions)
    }

    fn checked_key(&self, key: &str) -> Result<()> {
        if let Some(error_msg) = validate_key(key) {
            return Err(RecordError::InvalidRequest(error_msg));
        }
        self.sessions.touch(key);
        Ok(())
    }
}

/// Handler for GET /records
///
/// Lists every stored record, sorted by key.
pub async fn list_handler(State(state): State<AppState>) -> Result<Json<RecordListResponse>> {
    let records = state.cache.list_all().await?;
    Ok(Json(RecordListResponse::new(records)))
}

/// Handler for GET /records/:key
///
/// Creates the record with defaults unless `create=false` is passed.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<EntityRecord>> {
    state.checked_key(&key)?;

    state
        .cache
        .get_or_create(&key, query.create.unwrap_or(true))
        .await?
        .map(Json)
        .ok_or(RecordError::NotFound(key))
}

/// Handler for PATCH /records/:key
///
/// Merges the body into the record. Missing records are only created
/// with `create=true`.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<RecordQuery>,
    Json(patch): Json<RecordPatch>,
) -> Result<Json<EntityRecord>> {
    state.checked_key(&key)?;

    state
        .cache
        .update(&key, &patch, query.create.unwrap_or(false))
        .await?
        .map(Json)
        .ok_or(RecordError::NotFound(key))
}

/// Handler for DELETE /records/:key
pub async fn evict_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<EvictQuery>,
) -> Result<Json<EvictResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(RecordError::InvalidRequest(error_msg));
    }

    let removed = state.cache.evict(&key, query.cache_only).await?;
    if !query.cache_only {
        state.sessions.end(&key);
        info!("Deleted record '{}'", key);
    }

    Ok(Json(EvictResponse::new(key, removed, query.cache_only)))
}

/// Handler for POST /records/:key/actions/:action
///
/// A gate denial is a normal outcome and answers 200 with
/// `"status": "denied"`.
pub async fn perform_handler(
    State(state): State<AppState>,
    Path((key, action)): Path<(String, String)>,
    Json(req): Json<PerformRequest>,
) -> Result<Json<ActionResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(RecordError::InvalidRequest(error_msg));
    }
    state.checked_key(&key)?;

    let (policy, effect) = state
        .actions
        .resolve(&action, req.amount, state.cache.schema())?;
    let outcome = state
        .processor
        .perform(&key, &action, &policy, &effect)
        .await?;

    Ok(Json(ActionResponse::new(key, action, outcome)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;
    Json(StatsResponse::new(stats, state.sessions.len()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
