//! Axum-specific error types and mappings.
//!
//! Every failure reported outside an SSE stream uses the same JSON body:
//! `{error, code, retryable, status}`.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use relay_core::{ErrorCode, RelayError};
use serde::Serialize;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Bad request (invalid input).
    #[error("{0}")]
    BadRequest(String),

    /// Missing or wrong bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown or expired resource. `code` says which kind.
    #[error("{message}")]
    NotFound { code: ErrorCode, message: String },

    /// Upstream rate limit.
    #[error("{0}")]
    RateLimited(String),

    /// Upstream overloaded.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Upstream timed out.
    #[error("{0}")]
    GatewayTimeout(String),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl HttpError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) => ErrorCode::InvalidRequest,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::NotFound { code, .. } => *code,
            Self::RateLimited(_) => ErrorCode::RateLimit,
            Self::ServiceUnavailable(_) => ErrorCode::Overloaded,
            Self::GatewayTimeout(_) => ErrorCode::Timeout,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn stream_not_found(stream_id: &str) -> Self {
        Self::NotFound {
            code: ErrorCode::StreamNotFound,
            message: format!("Stream not found: {stream_id}"),
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: ErrorCode,
    retryable: bool,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            tracing::error!(code = %code, error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code,
            retryable: code.is_retryable(),
            status: status.as_u16(),
        };

        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, Self::Unauthorized(_)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<RelayError> for HttpError {
    fn from(err: RelayError) -> Self {
        let message = err.to_string();
        match err {
            RelayError::InvalidRequest(_) => Self::BadRequest(message),
            RelayError::Unauthorized(_) => Self::Unauthorized(message),
            RelayError::SessionNotFound(_) => Self::NotFound {
                code: ErrorCode::SessionNotFound,
                message,
            },
            RelayError::StreamNotFound(_) => Self::NotFound {
                code: ErrorCode::StreamNotFound,
                message,
            },
            RelayError::RateLimit(_) => Self::RateLimited(message),
            RelayError::Overloaded(_) => Self::ServiceUnavailable(message),
            RelayError::Timeout(_) => Self::GatewayTimeout(message),
            RelayError::Internal(_) => Self::Internal(message),
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for HttpError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_errors_map_to_statuses() {
        let cases = [
            (RelayError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (RelayError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (RelayError::SessionNotFound("x".into()), StatusCode::NOT_FOUND),
            (RelayError::StreamNotFound("x".into()), StatusCode::NOT_FOUND),
            (RelayError::RateLimit("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (RelayError::Overloaded("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (RelayError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (RelayError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let code = err.code();
            let http = HttpError::from(err);
            assert_eq!(http.status(), status);
            assert_eq!(http.code(), code);
        }
    }

    #[test]
    fn test_unauthorized_carries_challenge_header() {
        let response = HttpError::Unauthorized("missing token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
