//! Core domain types and port definitions for llm-relay.
//!
//! This crate owns everything the relay needs that is independent of HTTP:
//!
//! - `domain` - messages, content blocks, tool calls, usage, provider selection
//! - `events` - the closed set of stream events clients parse
//! - `ports` - the model invoker and clock abstractions
//! - `session` - the TTL-expiring store of suspended tool-calling conversations
//! - `streams` - the registry of in-flight invocations and their cancellation tokens

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod ids;
pub mod ports;
pub mod session;
pub mod streams;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use domain::{
    ApiKey, ChatRequest, CompletionResponse, ContentBlock, CredentialSource, GenerationConfig,
    InvocationOutcome, Message, MessageContent, PartialResponse, Provider, ProviderConfig,
    ProviderKeys, Role, StopReason, ToolCall, ToolDefinition, ToolResult, ToolResultContent,
    Usage,
};
pub use error::{ErrorCode, RelayError};
pub use events::{BlockType, ChunkKind, DonePayload, StreamEvent};
pub use ids::{SessionId, StreamId};
pub use ports::{
    Clock, InvocationContext, InvocationError, InvocationEvent, InvocationSink, ModelInvoker,
    SystemClock,
};
pub use session::{
    DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL, Session, SessionState, SessionStore,
    SessionUpdate,
};
pub use streams::{RegistryError, StreamGuard, StreamRegistry};

// Silence unused dev-dependency warnings for the async assertion helpers
#[cfg(test)]
use tokio_test as _;
