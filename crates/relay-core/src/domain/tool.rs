//! Tool calls requested by the model and results returned by clients.

use serde::{Deserialize, Serialize};

use super::message::ContentBlock;

/// A tool invocation the client must execute before the conversation resumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

impl ToolCall {
    /// The assistant content block that represents this call.
    #[must_use]
    pub fn to_block(&self) -> ContentBlock {
        ContentBlock::ToolUse {
            id: self.id.clone(),
            name: self.name.clone(),
            input: self.input.clone(),
        }
    }
}

/// Result payload: plain text or arbitrary structured content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Structured(serde_json::Value),
}

impl ToolResultContent {
    /// Render the payload as text for wire formats that only carry strings.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// The outcome of one tool call, as executed by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(alias = "tool_use_id", alias = "toolUseId", alias = "tool_call_id")]
    pub tool_call_id: String,
    pub content: ToolResultContent,
    #[serde(default, alias = "is_error")]
    pub is_error: bool,
}

impl ToolResult {
    /// A successful text result.
    pub fn text(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: ToolResultContent::Text(content.into()),
            is_error: false,
        }
    }

    /// The user content block that carries this result back to the model.
    #[must_use]
    pub fn to_block(&self) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: self.tool_call_id.clone(),
            content: self.content.clone(),
            is_error: self.is_error,
        }
    }
}
