use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::graph::LazyGraph;
use crate::handlers;
use crate::handlers::rate_limit::SharedRateLimiter;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
///
/// The graph is the only shared resource: constructed once per process,
/// lazily, and reused across requests. No other mutable state is shared.
#[derive(Clone)]
pub struct AppState {
    pub graph: LazyGraph,
    pub rate_limiter: SharedRateLimiter,
    /// Optional static API key. If set, chat routes require this key as a
    /// bearer credential. If not set, chat routes only accept loopback callers.
    pub api_key: Option<String>,
    pub keep_alive_interval_seconds: u64,
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    // SSE streaming route - no request timeout (the stream may outlive any
    // sensible request deadline; the transport's own timeout applies)
    let streaming_routes = Router::new()
        .route("/chat/stream", get(handlers::chat_stream))
        .with_state(state.clone());

    // Batch route - with request timeout
    let chat_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .with_state(state.clone())
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )));

    let guarded = Router::new()
        .merge(streaming_routes)
        .merge(chat_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::rate_limit::enforce_rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            handlers::api_auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(guarded)
        .layer(CorsLayer::permissive())
}
