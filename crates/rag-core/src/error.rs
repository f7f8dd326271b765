//! Cross-cutting error type for the pipeline core.
//!
//! Every component-local error converts into [`PipelineError`] via `#[from]` or
//! an explicit mapping; HTTP status translation happens exactly once, at the
//! axum boundary, via [`IntoResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The ten error kinds shared across every component.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Validation failure: length bounds, malformed field. Not retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing credentials or identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Network-policy or authorization violation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing collection, document, or chunk.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream 429 or local semaphore timeout.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Deadline exceeded.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Transport error reaching a downstream service.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Downstream returned a 5xx.
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// LLM output could not be parsed after repair.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Unexpected failure with no better classification.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether transport-level retry is appropriate for this error kind.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            PipelineError::Unreachable(_) | PipelineError::UpstreamError(_) | PipelineError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::Timeout(err.to_string())
        } else if err.is_connect() {
            PipelineError::Unreachable(err.to_string())
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                PipelineError::RateLimited(err.to_string())
            } else if status.is_server_error() {
                PipelineError::UpstreamError(err.to_string())
            } else {
                PipelineError::InvalidArgument(err.to_string())
            }
        } else {
            PipelineError::Unreachable(err.to_string())
        }
    }
}

/// Error response body returned to API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub status: u16,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let kind = match &self {
            PipelineError::InvalidArgument(_) => "invalid_argument",
            PipelineError::Unauthorized(_) => "unauthorized",
            PipelineError::Forbidden(_) => "forbidden",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::RateLimited(_) => "rate_limited",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Unreachable(_) => "unreachable",
            PipelineError::UpstreamError(_) => "upstream_error",
            PipelineError::ParseError(_) => "parse_error",
            PipelineError::Internal(_) => "internal",
        };

        let status = match &self {
            PipelineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PipelineError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PipelineError::Forbidden(_) => StatusCode::FORBIDDEN,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            PipelineError::ParseError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            kind: kind.to_string(),
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Result type alias used throughout the pipeline core.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_display() {
        let err = PipelineError::InvalidArgument("missing field".to_string());
        assert_eq!(err.to_string(), "invalid argument: missing field");
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = PipelineError::NotFound("collection".to_string());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = PipelineError::RateLimited("semaphore exhausted".to_string());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn unreachable_maps_to_503() {
        let err = PipelineError::Unreachable("connect refused".to_string());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_error_maps_to_502() {
        let err = PipelineError::UpstreamError("5xx".to_string());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn timeout_maps_to_504() {
        let err = PipelineError::Timeout("deadline exceeded".to_string());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn parse_error_is_not_retriable() {
        let err = PipelineError::ParseError("bad json".to_string());
        assert!(!err.is_retriable());
    }

    #[test]
    fn unreachable_is_retriable() {
        let err = PipelineError::Unreachable("x".to_string());
        assert!(err.is_retriable());
    }

    #[test]
    fn invalid_argument_is_not_retriable() {
        let err = PipelineError::InvalidArgument("x".to_string());
        assert!(!err.is_retriable());
    }

    #[test]
    fn error_response_roundtrip() {
        let resp = ErrorResponse {
            error: "boom".to_string(),
            kind: "internal".to_string(),
            status: 500,
        };
        let json = serde_json::to_string(&resp).unwrap();
        let deser: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(deser.error, "boom");
        assert_eq!(deser.status, 500);
    }
}
