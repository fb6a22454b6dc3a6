//! Per-caller request rate limiting.
//!
//! A keyed token-bucket limiter shared across the chat routes. Requests are
//! keyed by bearer credential when one is presented, otherwise by client
//! address, so distinct callers do not consume each other's quota.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::error_response;
use crate::handlers::api_auth::bearer_token;
use crate::server::AppState;

/// Shared keyed limiter.
pub type SharedRateLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// Build a limiter allowing `requests_per_minute` requests per caller.
///
/// A configured value of zero is treated as one to keep the quota valid.
#[must_use]
pub fn build_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let quota = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::keyed(Quota::per_minute(quota)))
}

/// Middleware enforcing the per-caller quota on chat routes.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let key = bearer_token(request.headers())
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string());

    if state.rate_limiter.check_key(&key).is_err() {
        return error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
    }

    next.run(request).await
}
