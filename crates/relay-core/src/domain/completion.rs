//! Results of one model invocation.

use serde::{Deserialize, Serialize};

use super::message::ContentBlock;
use super::tool::ToolCall;
use super::usage::Usage;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A finished round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub content: Vec<ContentBlock>,
    pub raw_assistant_text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
    pub model: String,
}

impl CompletionResponse {
    /// True when the client has to execute tools before the model can continue.
    #[must_use]
    pub fn requires_tool_results(&self) -> bool {
        self.stop_reason == StopReason::ToolUse && !self.tool_calls.is_empty()
    }
}

/// Whatever had been produced when cancellation was observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResponse {
    pub content: Vec<ContentBlock>,
    pub raw_assistant_text: String,
    pub usage: Usage,
}

impl From<CompletionResponse> for PartialResponse {
    fn from(response: CompletionResponse) -> Self {
        Self {
            content: response.content,
            raw_assistant_text: response.raw_assistant_text,
            usage: response.usage,
        }
    }
}

/// Terminal value of an invocation that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Completed(CompletionResponse),
    Aborted(PartialResponse),
}
