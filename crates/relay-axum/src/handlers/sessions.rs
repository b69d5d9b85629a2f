//! Session inspection and deletion.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use relay_core::{RelayError, SessionId};

use crate::dto::SessionSummaryDto;
use crate::error::HttpError;
use crate::state::AppState;

/// Redacted session summary. Does not extend the session's expiry.
/// GET /api/v1/sessions/{session_id}
pub async fn get(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummaryDto>, HttpError> {
    let session_id = SessionId::from(session_id);
    let session = state.sessions.get(&session_id).ok_or_else(|| {
        RelayError::SessionNotFound(format!(
            "Session {session_id} not found or expired; start a new conversation"
        ))
    })?;
    Ok(Json(session.into()))
}

/// Drop a session. Always succeeds.
/// DELETE /api/v1/sessions/{session_id}
pub async fn remove(State(state): State<AppState>, Path(session_id): Path<String>) -> StatusCode {
    state.sessions.delete(&SessionId::from(session_id));
    StatusCode::NO_CONTENT
}
