//! Request-level error taxonomy.
//!
//! Every application-level failure is caught at the handler boundary and
//! mapped to an HTTP status with a `{detail}` body; nothing propagates
//! unhandled to the transport layer, and no retries are attempted.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or empty required input.
    #[error("{0}")]
    Validation(String),

    /// The graph returned a result with no messages.
    #[error("no response from agent")]
    EmptyResponse,

    /// The graph failed during execution.
    #[error("{0}")]
    Upstream(String),
}

impl ChatError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::EmptyResponse | ChatError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Build a `{detail}` error response with an arbitrary status.
pub fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            ChatError::Validation("message must not be empty".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn empty_response_maps_to_500() {
        assert_eq!(
            ChatError::EmptyResponse.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ChatError::EmptyResponse.to_string(), "no response from agent");
    }

    #[test]
    fn upstream_carries_description_only() {
        let err = ChatError::Upstream("upstream error (status 502): bad gateway".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("bad gateway"));
    }
}
