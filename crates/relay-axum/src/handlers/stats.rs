//! Live counts for observability.

use axum::Json;
use axum::extract::State;

use crate::dto::StatsDto;
use crate::state::AppState;

/// GET /api/v1/stats
pub async fn get(State(state): State<AppState>) -> Json<StatsDto> {
    Json(StatsDto {
        sessions: state.sessions.count(),
        streams: state.streams.size(),
    })
}
