use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics::gather_metrics;
use crate::models::ConnectionRecord;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Registry size next to the sockets held by this process
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let snapshot = state.chat.registry.snapshot().await?;

    Ok(Json(StatsResponse {
        registered_connections: snapshot.len(),
        live_sockets: state.chat.connections.count(),
        backend: format!("{:?}", state.chat.config.state.backend).to_lowercase(),
    }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub registered_connections: usize,
    pub live_sockets: usize,
    pub backend: String,
}

/// Look up one registered connection
pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionRecord>> {
    state
        .chat
        .registry
        .lookup(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Connection {}", id)))
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.chat.config.observability.prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
        .into_response()
}
