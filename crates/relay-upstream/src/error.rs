//! Upstream failure classification.

use relay_core::InvocationError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Failures talking to an OpenAI-compatible provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, TLS or body transfer failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Provider returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The provider sent a body we could not parse.
    #[error("Malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Build a status error, preferring the provider's own error message.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    trimmed.chars().take(500).collect()
                }
            });
        Self::Status { status, message }
    }
}

impl From<UpstreamError> for InvocationError {
    fn from(err: UpstreamError) -> Self {
        let text = err.to_string();
        match err {
            UpstreamError::Http(e) if e.is_timeout() => Self::Timeout(text),
            UpstreamError::Http(_) | UpstreamError::Decode(_) => Self::Upstream(text),
            UpstreamError::Status { status, .. } => match status.as_u16() {
                400 | 404 | 422 => Self::InvalidRequest(text),
                401 | 403 => Self::Unauthorized(text),
                408 | 504 => Self::Timeout(text),
                429 => Self::RateLimited(text),
                503 | 529 => Self::Overloaded(text),
                _ => Self::Upstream(text),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_is_extracted() {
        let err = UpstreamError::from_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "Rate limit reached", "type": "requests"}}"#,
        );
        assert!(err.to_string().contains("Rate limit reached"));
        assert!(matches!(
            InvocationError::from(err),
            InvocationError::RateLimited(_)
        ));
    }

    #[test]
    fn test_status_classification() {
        let classify = |code: u16| {
            InvocationError::from(UpstreamError::from_status(
                StatusCode::from_u16(code).unwrap(),
                "",
            ))
        };
        assert!(matches!(classify(401), InvocationError::Unauthorized(_)));
        assert!(matches!(classify(400), InvocationError::InvalidRequest(_)));
        assert!(matches!(classify(503), InvocationError::Overloaded(_)));
        assert!(matches!(classify(529), InvocationError::Overloaded(_)));
        assert!(matches!(classify(504), InvocationError::Timeout(_)));
        assert!(matches!(classify(500), InvocationError::Upstream(_)));
    }
}
