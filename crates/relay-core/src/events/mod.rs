//! Canonical stream event union.
//!
//! This module is the single source of truth for what a client reading a
//! relay stream can receive. Transports serialize each variant on its own;
//! ordering is a property of the driver that emits them, not of formatting.
//!
//! # Wire Format
//!
//! Events are serialized with an `event` tag that doubles as the SSE event
//! name, and camelCase fields:
//!
//! ```json
//! { "event": "tool_calls", "calls": [...], "sessionId": "sess_..." }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{ContentBlock, Provider, StopReason, ToolCall, ToolResult, Usage};
use crate::error::{ErrorCode, RelayError};
use crate::ids::{SessionId, StreamId};
use crate::ports::InvocationEvent;

/// Kind of text carried by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Text,
    Thinking,
    ToolInput,
}

/// Kind of content block being streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Text,
    Thinking,
    ToolUse,
}

/// Final payload of a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    pub content: Vec<ContentBlock>,
    pub raw_assistant_text: String,
    pub tool_calls: Vec<ToolCall>,
    /// Tool results folded into this round (continuations only).
    pub tool_results: Vec<ToolResult>,
    pub stop_reason: StopReason,
    /// This round's own usage, not a running total.
    pub usage: Usage,
    pub model: String,
    pub provider: Provider,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_tool_results: Option<bool>,
    /// Set when the round was cancelled and `content` is partial.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aborted: bool,
}

/// One event in a relay stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// First event of every round; carries the id needed to abort it.
    StreamStart { stream_id: StreamId },

    /// A fragment of generated text.
    Chunk {
        text: String,
        #[serde(rename = "type")]
        kind: ChunkKind,
        visible: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block_index: Option<usize>,
    },

    BlockStart {
        index: usize,
        #[serde(rename = "type")]
        block_type: BlockType,
    },

    BlockComplete {
        index: usize,
        #[serde(rename = "type")]
        block_type: BlockType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ContentBlock>,
    },

    /// Text produced before the model switched to calling tools.
    PreToolContent { text: String },

    Usage(Usage),

    /// Tools the client must execute; always followed by `done`.
    ToolCalls {
        calls: Vec<ToolCall>,
        session_id: SessionId,
    },

    Done(Box<DonePayload>),

    Error {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },
}

impl StreamEvent {
    /// SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StreamStart { .. } => "stream_start",
            Self::Chunk { .. } => "chunk",
            Self::BlockStart { .. } => "block_start",
            Self::BlockComplete { .. } => "block_complete",
            Self::PreToolContent { .. } => "pre_tool_content",
            Self::Usage(_) => "usage",
            Self::ToolCalls { .. } => "tool_calls",
            Self::Done(_) => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether no further event follows in the same round.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error { .. })
    }

    /// Build an `error` event from a domain error.
    #[must_use]
    pub fn error(err: &RelayError) -> Self {
        let code = err.code();
        Self::Error {
            code,
            message: err.to_string(),
            retryable: code.is_retryable(),
        }
    }
}

impl From<InvocationEvent> for StreamEvent {
    fn from(event: InvocationEvent) -> Self {
        match event {
            InvocationEvent::Chunk {
                text,
                kind,
                visible,
                block_index,
            } => Self::Chunk {
                text,
                kind,
                visible,
                block_index,
            },
            InvocationEvent::BlockStart { index, block_type } => {
                Self::BlockStart { index, block_type }
            }
            InvocationEvent::BlockComplete {
                index,
                block_type,
                content,
            } => Self::BlockComplete {
                index,
                block_type,
                content,
            },
            InvocationEvent::PreToolContent { text } => Self::PreToolContent { text },
            InvocationEvent::Usage(usage) => Self::Usage(usage),
        }
    }
}
