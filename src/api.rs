// src/api.rs
//! HTTP surface. Read endpoints serve the published snapshot as-is; only
//! `POST /api/sync` waits on a cycle.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Request, State},
    http::{header::HeaderName, request::Parts, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::ServerSettings;
use crate::error::SyncError;
use crate::metrics::Metrics;
use crate::sync::SyncEngine;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub api_key: Option<Arc<str>>,
    pub cors_origins: Arc<[String]>,
    pub trigger_timeout: Duration,
    pub metrics: Option<Metrics>,
}

impl AppState {
    pub fn new(engine: Arc<SyncEngine>, server: &ServerSettings) -> Self {
        Self {
            engine,
            api_key: server.api_key.as_deref().map(Arc::from),
            cors_origins: server.cors_origins.clone().into(),
            trigger_timeout: Duration::from_secs(server.trigger_timeout_secs.max(1)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or invalid API key")]
    Unauthorized,

    #[error("sync failed: {0}")]
    SyncFailed(#[from] SyncError),

    #[error("sync still running after {0:?}")]
    TriggerTimeout(Duration),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::SyncFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::TriggerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/sync", get(get_sync).post(trigger_sync))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/{source}", get(list_tasks_by_source))
        .route("/api/status", get(sync_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(|| async { "ok" }))
        .merge(api)
        .with_state(state.clone());

    if let Some(m) = &state.metrics {
        app = app.merge(m.router());
    }
    app.layer(cors_layer(&state.cors_origins))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "Task Sync API" }))
}

async fn get_sync(State(state): State<AppState>) -> Response {
    let snapshot = state.engine.store().current();
    Json(&*snapshot).into_response()
}

async fn trigger_sync(State(state): State<AppState>) -> Result<Response, ApiError> {
    match tokio::time::timeout(state.trigger_timeout, state.engine.trigger()).await {
        Ok(Ok(snapshot)) => Ok(Json(&*snapshot).into_response()),
        Ok(Err(e)) => Err(ApiError::SyncFailed(e)),
        Err(_) => {
            tracing::warn!(timeout = ?state.trigger_timeout, "trigger wait elapsed; cycle continues in background");
            Err(ApiError::TriggerTimeout(state.trigger_timeout))
        }
    }
}

async fn list_tasks(State(state): State<AppState>) -> Response {
    let snapshot = state.engine.store().current();
    Json(&snapshot.all_tasks).into_response()
}

async fn list_tasks_by_source(State(state): State<AppState>, Path(source): Path<String>) -> Response {
    let snapshot = state.engine.store().current();
    Json(snapshot.tasks_for(&source)).into_response()
}

async fn sync_status(State(state): State<AppState>) -> Response {
    Json(state.engine.store().status()).into_response()
}

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if !provided.is_some_and(|p| keys_match(expected, p)) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

/// Compares digests so neither key contents nor length change the timing.
fn keys_match(expected: &str, provided: &str) -> bool {
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(provided.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns: Arc<[String]> = origins.iter().map(|o| o.trim().to_string()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin
                .to_str()
                .map(|o| patterns.iter().any(|p| origin_matches(p, o)))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            HeaderName::from_static("content-type"),
            HeaderName::from_static(API_KEY_HEADER),
        ]))
}

/// Exact match, or a single `*` standing for any run of characters.
fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() > prefix.len() + suffix.len() && origin.starts_with(prefix) && origin.ends_with(suffix)
        }
    }
}
