//! Static bearer-token gate for `/api/*`.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::HttpError;

/// Auth middleware: validate Bearer token.
///
/// The `expected` parameter contains the full "Bearer <token>" string,
/// so the check is a direct comparison without allocating.
pub async fn validate_bearer(expected: Arc<str>, req: Request, next: Next) -> Response {
    let auth = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth {
        Some(h) if h == expected.as_ref() => next.run(req).await,
        _ => {
            tracing::warn!(
                path = %req.uri().path(),
                "Unauthorized API request - missing or invalid token"
            );
            HttpError::Unauthorized("Missing or invalid bearer token".to_string()).into_response()
        }
    }
}
