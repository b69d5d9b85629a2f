//! Error taxonomy shared by every layer of the relay.
//!
//! Each failure carries a stable [`ErrorCode`] that clients switch on and a
//! retryability flag derived from it. Adapters map codes to transport details
//! (HTTP status, SSE `error` events) but never invent new codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::InvocationError;

/// Stable error discriminant for client-side handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    Unauthorized,
    SessionNotFound,
    StreamNotFound,
    RateLimit,
    Overloaded,
    Timeout,
    InternalError,
}

impl ErrorCode {
    /// Returns true if this error indicates a temporary condition
    /// where retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Overloaded | Self::Timeout)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::SessionNotFound => "session_not_found",
            Self::StreamNotFound => "stream_not_found",
            Self::RateLimit => "rate_limit",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error for relay operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Malformed or unserviceable input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Session identifier is unknown or expired.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Stream identifier is unknown or already finished.
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Upstream rate limit hit.
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// Upstream temporarily overloaded.
    #[error("Overloaded: {0}")]
    Overloaded(String),

    /// Upstream did not answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::SessionNotFound(_) => ErrorCode::SessionNotFound,
            Self::StreamNotFound(_) => ErrorCode::StreamNotFound,
            Self::RateLimit(_) => ErrorCode::RateLimit,
            Self::Overloaded(_) => ErrorCode::Overloaded,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<InvocationError> for RelayError {
    fn from(err: InvocationError) -> Self {
        match err {
            InvocationError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            InvocationError::Unauthorized(msg) => Self::Unauthorized(msg),
            InvocationError::RateLimited(msg) => Self::RateLimit(msg),
            InvocationError::Overloaded(msg) => Self::Overloaded(msg),
            InvocationError::Timeout(msg) => Self::Timeout(msg),
            InvocationError::Upstream(msg) => Self::Internal(msg),
        }
    }
}
