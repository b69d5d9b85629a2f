//! Non-streaming completion.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use relay_core::DonePayload;
use relay_stream::misrouted_continuation;
use serde_json::Value;

use crate::dto::StreamBody;
use crate::error::HttpError;
use crate::state::AppState;

/// Run one round and return the `done` payload as JSON.
/// POST /api/v1/complete
///
/// Not registered as a stream and never creates a session, so tool calls
/// in the response cannot be continued.
pub async fn complete(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DonePayload>, HttpError> {
    let Json(body) = payload?;
    let StreamBody::Fresh(body) = StreamBody::parse(body)? else {
        return Err(misrouted_continuation().into());
    };
    let provider = body.provider_config();
    let done = state.driver.complete(provider, body.request).await?;
    Ok(Json(done))
}
