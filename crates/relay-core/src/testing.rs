//! Test doubles for the clock and model invoker ports.
//!
//! Available to this crate's tests and, through the `test-utils` feature, to
//! downstream crates' tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    ChatRequest, CompletionResponse, ContentBlock, InvocationOutcome, PartialResponse, StopReason,
    ToolCall, Usage,
};
use crate::events::{BlockType, ChunkKind};
use crate::ports::{
    Clock, InvocationContext, InvocationError, InvocationEvent, InvocationSink, ModelInvoker,
};

/// Model name reported by scripted rounds.
pub const SCRIPTED_MODEL: &str = "scripted-model";

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(DateTime::from_timestamp(1_767_225_600, 0).unwrap_or_default())
    }

    #[must_use]
    pub const fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a scripted round ends after its events are emitted.
#[derive(Debug, Clone)]
pub enum ScriptedEnding {
    Complete(CompletionResponse),
    Fail(InvocationError),
    /// Block until cancelled, then report the given partial output.
    WaitForCancel(PartialResponse),
}

/// One invocation's worth of scripted behaviour.
#[derive(Debug, Clone)]
pub struct ScriptedRound {
    pub events: Vec<InvocationEvent>,
    pub ending: ScriptedEnding,
}

impl ScriptedRound {
    /// A round that streams `text` and ends the turn.
    pub fn end_turn(text: impl Into<String>, usage: Usage) -> Self {
        let text = text.into();
        let block = ContentBlock::text(text.clone());
        Self {
            events: text_events(&text, 0)
                .into_iter()
                .chain([InvocationEvent::Usage(usage)])
                .collect(),
            ending: ScriptedEnding::Complete(CompletionResponse {
                content: vec![block],
                raw_assistant_text: text.clone(),
                tool_calls: Vec::new(),
                stop_reason: StopReason::EndTurn,
                usage,
                model: SCRIPTED_MODEL.to_string(),
            }),
        }
    }

    /// A round that says `preamble` and then asks for `calls`.
    pub fn tool_use(preamble: impl Into<String>, calls: Vec<ToolCall>, usage: Usage) -> Self {
        let preamble = preamble.into();
        let mut events = Vec::new();
        let mut content = Vec::new();
        let mut index = 0;

        if !preamble.is_empty() {
            events.extend(text_events(&preamble, index));
            events.push(InvocationEvent::PreToolContent {
                text: preamble.clone(),
            });
            content.push(ContentBlock::text(preamble.clone()));
            index += 1;
        }
        for call in &calls {
            events.push(InvocationEvent::BlockStart {
                index,
                block_type: BlockType::ToolUse,
            });
            events.push(InvocationEvent::Chunk {
                text: call.input.to_string(),
                kind: ChunkKind::ToolInput,
                visible: false,
                block_index: Some(index),
            });
            events.push(InvocationEvent::BlockComplete {
                index,
                block_type: BlockType::ToolUse,
                content: Some(call.to_block()),
            });
            content.push(call.to_block());
            index += 1;
        }
        events.push(InvocationEvent::Usage(usage));

        Self {
            events,
            ending: ScriptedEnding::Complete(CompletionResponse {
                content,
                raw_assistant_text: preamble,
                tool_calls: calls,
                stop_reason: StopReason::ToolUse,
                usage,
                model: SCRIPTED_MODEL.to_string(),
            }),
        }
    }

    /// A round that emits nothing and fails.
    #[must_use]
    pub const fn failing(err: InvocationError) -> Self {
        Self {
            events: Vec::new(),
            ending: ScriptedEnding::Fail(err),
        }
    }

    /// A round that streams `partial` and then waits to be cancelled.
    pub fn until_cancelled(partial: impl Into<String>) -> Self {
        let partial = partial.into();
        let events = if partial.is_empty() {
            Vec::new()
        } else {
            vec![InvocationEvent::Chunk {
                text: partial.clone(),
                kind: ChunkKind::Text,
                visible: true,
                block_index: Some(0),
            }]
        };
        let content = if partial.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(partial.clone())]
        };
        Self {
            events,
            ending: ScriptedEnding::WaitForCancel(PartialResponse {
                content,
                raw_assistant_text: partial,
                usage: Usage::new(3, 1),
            }),
        }
    }
}

fn text_events(text: &str, index: usize) -> Vec<InvocationEvent> {
    vec![
        InvocationEvent::BlockStart {
            index,
            block_type: BlockType::Text,
        },
        InvocationEvent::Chunk {
            text: text.to_string(),
            kind: ChunkKind::Text,
            visible: true,
            block_index: Some(index),
        },
        InvocationEvent::BlockComplete {
            index,
            block_type: BlockType::Text,
            content: Some(ContentBlock::text(text)),
        },
    ]
}

/// Invoker that plays back scripted rounds in order.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    rounds: Mutex<VecDeque<ScriptedRound>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl ScriptedInvoker {
    #[must_use]
    pub fn new(rounds: impl IntoIterator<Item = ScriptedRound>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn push(&self, round: ScriptedRound) {
        self.rounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(round);
    }

    /// Number of invocations so far, streaming or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_round(&self, request: &ChatRequest) -> Result<ScriptedRound, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.rounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| InvocationError::Upstream("no scripted round left".to_string()))
    }

    async fn finish(
        ending: ScriptedEnding,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        match ending {
            ScriptedEnding::Complete(response) => Ok(InvocationOutcome::Completed(response)),
            ScriptedEnding::Fail(err) => Err(err),
            ScriptedEnding::WaitForCancel(partial) => {
                cancel.cancelled().await;
                Ok(InvocationOutcome::Aborted(partial))
            }
        }
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn complete(
        &self,
        _ctx: &InvocationContext,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        let round = self.next_round(request)?;
        Self::finish(round.ending, cancel).await
    }

    async fn stream(
        &self,
        _ctx: &InvocationContext,
        request: &ChatRequest,
        sink: &dyn InvocationSink,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        let round = self.next_round(request)?;
        for event in round.events {
            if cancel.is_cancelled() {
                return Ok(InvocationOutcome::Aborted(PartialResponse::default()));
            }
            sink.emit(event);
            tokio::task::yield_now().await;
        }
        Self::finish(round.ending, cancel).await
    }
}
