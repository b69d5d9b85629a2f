//! Model invoker port: the opaque collaborator that actually calls a model.
//!
//! Provider-specific request shaping, retries and prompt caching live behind
//! this trait. The relay only needs two operations and a cooperative
//! cancellation contract: when the token passed in is cancelled, the invoker
//! stops at its next suspension point and returns
//! [`InvocationOutcome::Aborted`] with whatever it had produced so far.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{ApiKey, ChatRequest, ContentBlock, InvocationOutcome, Provider, Usage};
use crate::events::{BlockType, ChunkKind};

/// Resolved provider endpoint and credentials for one invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub provider: Provider,
    pub api_key: ApiKey,
    /// OpenAI-compatible base URL, without trailing slash.
    pub base_url: String,
}

/// Incremental output reported while a streaming invocation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationEvent {
    Chunk {
        text: String,
        kind: ChunkKind,
        visible: bool,
        block_index: Option<usize>,
    },
    BlockStart {
        index: usize,
        block_type: BlockType,
    },
    BlockComplete {
        index: usize,
        block_type: BlockType,
        content: Option<ContentBlock>,
    },
    /// Text the model produced before deciding to call tools.
    PreToolContent {
        text: String,
    },
    Usage(Usage),
}

/// Receiver of streaming callbacks.
///
/// Called synchronously from the invoker's task, in generation order.
pub trait InvocationSink: Send + Sync {
    fn emit(&self, event: InvocationEvent);
}

/// Errors surfaced by the model invoker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// The provider rejected the request as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider rejected the credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The provider rate-limited the call.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The provider is overloaded.
    #[error("Overloaded: {0}")]
    Overloaded(String),

    /// The call timed out.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Any other upstream failure.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Port for invoking a model.
#[async_trait]
pub trait ModelInvoker: Send + Sync + fmt::Debug {
    /// Run a request to completion without streaming callbacks.
    ///
    /// # Errors
    ///
    /// Returns `InvocationError` if the provider call fails.
    async fn complete(
        &self,
        ctx: &InvocationContext,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError>;

    /// Run a request, reporting incremental output to `sink` as it arrives.
    ///
    /// # Errors
    ///
    /// Returns `InvocationError` if the provider call fails before a
    /// completed or aborted outcome is available.
    async fn stream(
        &self,
        ctx: &InvocationContext,
        request: &ChatRequest,
        sink: &dyn InvocationSink,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError>;
}
