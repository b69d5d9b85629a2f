//! Streaming handlers: start, continue and abort rounds.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use relay_core::StreamId;
use relay_stream::StreamDriver;
use serde_json::Value;

use crate::dto::{AbortResponseDto, ContinueRequestDto, StreamBody};
use crate::error::HttpError;
use crate::sse::sse_response;
use crate::state::AppState;

/// Start a fresh round.
/// POST /api/v1/stream
///
/// Validation and credential failures are JSON errors; once the SSE body
/// starts, failures arrive as an `error` event. A continuation body sent
/// here gets a single `error` event naming the continuation endpoint.
pub async fn start(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(body) = payload?;
    let events = match StreamBody::parse(body)? {
        StreamBody::Fresh(dto) => state.driver.start(dto.into())?,
        StreamBody::Misrouted { session_id } => {
            StreamDriver::reject_continuation(session_id.as_deref())
        }
    };
    Ok(sse_response(events))
}

/// Resume a suspended session with tool results.
/// POST /api/v1/stream/continue
pub async fn continue_stream(
    State(state): State<AppState>,
    payload: Result<Json<ContinueRequestDto>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let Json(body) = payload?;
    let events = state.coordinator.resume(body.into())?;
    Ok(sse_response(events))
}

/// Cancel an in-flight round.
/// POST /api/v1/stream/{stream_id}/abort
pub async fn abort(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<Json<AbortResponseDto>, HttpError> {
    let stream_id = StreamId::from(stream_id);
    if !state.driver.abort(&stream_id) {
        return Err(HttpError::stream_not_found(stream_id.as_str()));
    }
    Ok(Json(AbortResponseDto {
        aborted: true,
        stream_id,
    }))
}
