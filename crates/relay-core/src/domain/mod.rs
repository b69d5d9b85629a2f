//! Domain types for relayed conversations.
//!
//! These types are pure data with serde derives. They describe what a client
//! sends (a normalized chat request), what the model invoker produces (content
//! blocks, tool calls, usage) and how provider credentials are selected.

mod completion;
mod message;
mod provider;
mod tool;
mod usage;

pub use completion::{CompletionResponse, InvocationOutcome, PartialResponse, StopReason};
pub use message::{
    ChatRequest, ContentBlock, GenerationConfig, Message, MessageContent, Role, ToolDefinition,
};
pub use provider::{ApiKey, CredentialSource, Provider, ProviderConfig, ProviderKeys};
pub use tool::{ToolCall, ToolResult, ToolResultContent};
pub use usage::Usage;
