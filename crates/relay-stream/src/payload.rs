//! Construction of `done` payloads.

use std::time::Duration;

use relay_core::{
    CompletionResponse, DonePayload, PartialResponse, Provider, StopReason, ToolResult,
};

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Payload for a round that ran to completion.
pub(crate) fn completed(
    response: CompletionResponse,
    provider: Provider,
    tool_results: Vec<ToolResult>,
    elapsed: Duration,
) -> DonePayload {
    let requires_tool_results = response.requires_tool_results().then_some(true);
    DonePayload {
        content: response.content,
        raw_assistant_text: response.raw_assistant_text,
        tool_calls: response.tool_calls,
        tool_results,
        stop_reason: response.stop_reason,
        usage: response.usage,
        model: response.model,
        provider,
        duration_ms: millis(elapsed),
        requires_tool_results,
        aborted: false,
    }
}

/// Payload for a cancelled round: partial content and a neutral stop reason.
pub(crate) fn aborted(
    partial: PartialResponse,
    model: &str,
    provider: Provider,
    tool_results: Vec<ToolResult>,
    elapsed: Duration,
) -> DonePayload {
    DonePayload {
        content: partial.content,
        raw_assistant_text: partial.raw_assistant_text,
        tool_calls: Vec::new(),
        tool_results,
        stop_reason: StopReason::EndTurn,
        usage: partial.usage,
        model: model.to_string(),
        provider,
        duration_ms: millis(elapsed),
        requires_tool_results: None,
        aborted: true,
    }
}
