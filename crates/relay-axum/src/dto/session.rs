//! Session inspection and stats DTOs.

use chrono::{DateTime, Utc};
use relay_core::{Provider, Session, SessionId, Usage};
use serde::{Deserialize, Serialize};

/// Redacted view of a suspended session. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryDto {
    pub id: SessionId,
    pub provider: Provider,
    /// Whether the session holds a client-supplied key.
    pub byok: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub model: String,
    /// Ids of the tool calls the client still has to answer.
    pub pending_tool_calls: Vec<String>,
    /// Running token totals across all rounds so far.
    pub usage: Usage,
}

impl From<Session> for SessionSummaryDto {
    fn from(session: Session) -> Self {
        Self {
            provider: session.provider.provider,
            byok: session.provider.is_byok(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            model: session.request.model,
            pending_tool_calls: session
                .state
                .pending_tool_calls
                .into_iter()
                .map(|c| c.id)
                .collect(),
            usage: session.state.usage,
            id: session.id,
        }
    }
}

/// Live counts for `GET /api/v1/stats`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsDto {
    pub sessions: usize,
    pub streams: usize,
}
