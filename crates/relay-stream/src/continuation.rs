//! Resumption of suspended tool-calling conversations.
//!
//! A continuation loads the session, appends the assistant turn that asked
//! for tools plus a user turn carrying the client's results, and replays the
//! driver on the extended request. When that round stops for tools again
//! the session absorbs it: raw text is concatenated, blocks and pending calls
//! are replaced, usage is summed. Any other ending deletes the session once
//! the final event has been sent.
//!
//! Two concurrent continuations of the same session are not serialized; the
//! later update wins.

use std::collections::HashSet;
use std::sync::Arc;

use relay_core::{
    ChatRequest, CompletionResponse, Message, RelayError, Role, Session, SessionId, SessionState,
    SessionStore, SessionUpdate, ToolResult,
};
use tracing::{debug, info, warn};

use crate::driver::{EventStream, RoundHandoff, RoundPlan, StreamDriver};

/// A client's answer to a `tool_calls` event.
#[derive(Debug, Clone)]
pub struct ContinueRequest {
    pub session_id: SessionId,
    /// `None` when the client omitted the field entirely.
    pub tool_results: Option<Vec<ToolResult>>,
}

/// Resumes sessions through the [`StreamDriver`].
#[derive(Debug, Clone)]
pub struct ContinuationCoordinator {
    driver: Arc<StreamDriver>,
}

impl ContinuationCoordinator {
    #[must_use]
    pub const fn new(driver: Arc<StreamDriver>) -> Self {
        Self { driver }
    }

    /// Resume a session with tool results and stream the next round.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if the session is unknown or expired and
    /// `InvalidRequest` if the tool results are missing or malformed. In both
    /// cases no stream is registered and nothing is invoked.
    pub fn resume(&self, request: ContinueRequest) -> Result<EventStream, RelayError> {
        let sessions = self.driver.sessions();
        let session = sessions
            .get(&request.session_id)
            .ok_or_else(|| session_not_found(&request.session_id))?;

        let results = validate_tool_results(request.tool_results)?;
        warn_on_unknown_results(&session, &results);

        let ctx = self.driver.keys().resolve(&session.provider)?;
        let extended = extend_request(&session, &results);

        // Results are folded in only when the round suspends again, so a
        // failed round can be retried with the same results.
        let session = sessions
            .update(&session.id, SessionUpdate::default())
            .ok_or_else(|| session_not_found(&request.session_id))?;

        info!(
            session_id = %session.id,
            tool_results = results.len(),
            "Resuming session"
        );

        let plan = RoundPlan {
            provider: session.provider.clone(),
            ctx,
            request: extended,
        };
        let handoff = ContinuationRound {
            session_id: session.id,
            prior: session.state,
            submitted: results,
        };
        Ok(self.driver.spawn_round(plan, handoff))
    }
}

fn session_not_found(id: &SessionId) -> RelayError {
    RelayError::SessionNotFound(format!("Session '{id}' not found or expired"))
}

fn validate_tool_results(results: Option<Vec<ToolResult>>) -> Result<Vec<ToolResult>, RelayError> {
    let results = results
        .ok_or_else(|| RelayError::InvalidRequest("toolResults is required".to_string()))?;
    if results.is_empty() {
        return Err(RelayError::InvalidRequest(
            "toolResults must contain at least one result".to_string(),
        ));
    }
    if let Some(index) = results
        .iter()
        .position(|r| r.tool_call_id.trim().is_empty())
    {
        return Err(RelayError::InvalidRequest(format!(
            "toolResults[{index}] is missing toolCallId"
        )));
    }
    Ok(results)
}

fn warn_on_unknown_results(session: &Session, results: &[ToolResult]) {
    let pending: HashSet<&str> = session
        .state
        .pending_tool_calls
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    for result in results {
        if !pending.contains(result.tool_call_id.as_str()) {
            warn!(
                session_id = %session.id,
                tool_call_id = %result.tool_call_id,
                "Tool result does not match a pending tool call"
            );
        }
    }
}

/// The stored history plus the assistant's tool-calling turn and the results turn.
fn extend_request(session: &Session, results: &[ToolResult]) -> ChatRequest {
    let mut assistant = session.state.content_blocks.clone();
    for call in &session.state.pending_tool_calls {
        let present = assistant
            .iter()
            .any(|block| block.tool_use_id() == Some(call.id.as_str()));
        if !present {
            assistant.push(call.to_block());
        }
    }

    let mut request = session.request.clone();
    if !assistant.is_empty() {
        request
            .messages
            .push(Message::blocks(Role::Assistant, assistant));
    }
    request.messages.push(Message::blocks(
        Role::User,
        results.iter().map(ToolResult::to_block).collect(),
    ));
    request
}

/// Results already folded in, followed by the submitted ones. A resubmitted
/// result replaces the earlier one for the same tool call.
fn fold_results(prior: &[ToolResult], submitted: &[ToolResult]) -> Vec<ToolResult> {
    let resubmitted: HashSet<&str> = submitted
        .iter()
        .map(|r| r.tool_call_id.as_str())
        .collect();
    prior
        .iter()
        .filter(|r| !resubmitted.contains(r.tool_call_id.as_str()))
        .chain(submitted)
        .cloned()
        .collect()
}

/// Handoff of a round that resumes an existing session.
#[derive(Debug)]
struct ContinuationRound {
    session_id: SessionId,
    /// Session state as of the start of this round.
    prior: SessionState,
    submitted: Vec<ToolResult>,
}

impl RoundHandoff for ContinuationRound {
    fn suspend(
        &self,
        sessions: &SessionStore,
        plan: &RoundPlan,
        response: &CompletionResponse,
    ) -> Result<SessionId, RelayError> {
        let update = SessionUpdate {
            request: Some(plan.request.clone()),
            raw_assistant_text: Some(format!(
                "{}{}",
                self.prior.raw_assistant_text, response.raw_assistant_text
            )),
            content_blocks: Some(response.content.clone()),
            pending_tool_calls: Some(response.tool_calls.clone()),
            tool_results: Some(fold_results(&self.prior.tool_results, &self.submitted)),
            usage: Some(self.prior.usage.plus(&response.usage)),
        };
        let session = sessions
            .update(&self.session_id, update)
            .ok_or_else(|| session_not_found(&self.session_id))?;
        debug!(
            session_id = %session.id,
            input_tokens = session.state.usage.input_tokens,
            output_tokens = session.state.usage.output_tokens,
            "Session absorbed another tool round"
        );
        Ok(session.id)
    }

    fn finish(&self, sessions: &SessionStore) {
        sessions.delete(&self.session_id);
    }

    fn tool_results(&self) -> Vec<ToolResult> {
        self.submitted.clone()
    }
}
