//! Suspended tool-calling conversations.
//!
//! A session exists from the moment a round stops for tool use until the
//! conversation finishes, is aborted, is deleted by the client, or expires.
//! All mutation goes through [`SessionStore::update`], which also slides the
//! expiry forward.

mod store;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{ChatRequest, ContentBlock, ProviderConfig, ToolCall, ToolResult, Usage};
use crate::ids::SessionId;

pub use store::SessionStore;

/// Default sliding time-to-live of a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval of the background expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Accumulated conversation output carried between rounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Raw assistant text across all rounds so far.
    pub raw_assistant_text: String,
    /// Content blocks of the most recent round.
    pub content_blocks: Vec<ContentBlock>,
    /// Tool calls the client still has to answer.
    pub pending_tool_calls: Vec<ToolCall>,
    /// Tool results already folded into the conversation.
    pub tool_results: Vec<ToolResult>,
    /// Running usage totals across rounds.
    pub usage: Usage,
}

/// One suspended conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Provider and credential choice, kept so continuations reuse them.
    pub provider: ProviderConfig,
    /// Request history as of the last round.
    pub request: ChatRequest,
    pub state: SessionState,
}

/// Partial update of a session. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub request: Option<ChatRequest>,
    pub raw_assistant_text: Option<String>,
    pub content_blocks: Option<Vec<ContentBlock>>,
    pub pending_tool_calls: Option<Vec<ToolCall>>,
    pub tool_results: Option<Vec<ToolResult>>,
    pub usage: Option<Usage>,
}

impl SessionUpdate {
    fn apply(self, session: &mut Session) {
        if let Some(request) = self.request {
            session.request = request;
        }
        if let Some(text) = self.raw_assistant_text {
            session.state.raw_assistant_text = text;
        }
        if let Some(blocks) = self.content_blocks {
            session.state.content_blocks = blocks;
        }
        if let Some(calls) = self.pending_tool_calls {
            session.state.pending_tool_calls = calls;
        }
        if let Some(results) = self.tool_results {
            session.state.tool_results = results;
        }
        if let Some(usage) = self.usage {
            session.state.usage = usage;
        }
    }
}
