//! Static API-key authentication.
//!
//! Behavior:
//! - Key configured: requires `Authorization: Bearer <key>` header
//! - Key not configured: only accepts requests from loopback addresses

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::server::AppState;

/// Extract the bearer credential from request headers, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Check if a request is authorized against an optional API key.
///
/// - If key is `Some`: requires a matching bearer credential (constant-time via SHA-256)
/// - If key is `None`: only allows requests from loopback addresses
pub fn is_authorized(key: &Option<String>, addr: &SocketAddr, headers: &HeaderMap) -> bool {
    match key {
        Some(expected) => bearer_token(headers).is_some_and(|provided| {
            let a = Sha256::digest(provided.as_bytes());
            let b = Sha256::digest(expected.as_bytes());
            a == b
        }),
        None => addr.ip().is_loopback(),
    }
}

/// Middleware guarding the chat routes.
///
/// Uses `api_key` from `AppState`. Always installed - falls back to
/// localhost-only when no key is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if is_authorized(&state.api_key, &addr, request.headers()) {
        next.run(request).await
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}
