use crate::api::{handlers, AppState};
use crate::config::ServerConfig;
use crate::websocket::websocket_handler;
use axum::{routing::get, Router};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let timeout = request_timeout(&state.chat.config.server);

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        // Chat
        .route("/ws", get(websocket_handler))
        .route("/v1/stats", get(handlers::stats))
        .route("/v1/connections/:id", get(handlers::get_connection))
        // Prometheus
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().include_headers(true))
                        .on_response(DefaultOnResponse::new().include_headers(true)),
                )
                .layer(timeout)
                .layer(CorsLayer::permissive()),
        )
}

/// Requests running longer than the configured limit are answered with 408.
/// A WebSocket upgrade completes immediately, so sockets are unaffected.
pub fn request_timeout(config: &ServerConfig) -> TimeoutLayer {
    TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))
}
