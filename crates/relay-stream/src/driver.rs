//! Streaming protocol driver.
//!
//! One call to [`StreamDriver::start`] (or a continuation) runs exactly one
//! round:
//!
//! 1. a stream id is registered and `stream_start` is queued before the
//!    collaborator is invoked,
//! 2. collaborator callbacks are forwarded in the order they arrive,
//! 3. the stream is deregistered, then exactly one terminal sequence is
//!    emitted: `tool_calls` + `done`, `done`, or `error`.
//!
//! Deregistration is tied to a [`StreamGuard`], so it also happens if the
//! collaborator panics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use relay_core::{
    ChatRequest, CompletionResponse, DonePayload, InvocationContext, InvocationError,
    InvocationEvent, InvocationOutcome, InvocationSink, ModelInvoker, PartialResponse,
    ProviderConfig, ProviderKeys, RelayError, SessionId, SessionState, SessionStore, StreamEvent,
    StreamGuard, StreamId, StreamRegistry, ToolResult,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::payload;

/// Ordered events of one round. Ends after the terminal event.
pub type EventStream = UnboundedReceiverStream<StreamEvent>;

/// A request to start a fresh conversation.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub provider: ProviderConfig,
    pub request: ChatRequest,
    /// Continuation fields. Present only when a client sent tool results to
    /// the wrong entry point.
    pub session_id: Option<String>,
    pub tool_results: Option<Vec<ToolResult>>,
}

impl StartRequest {
    #[must_use]
    pub const fn new(provider: ProviderConfig, request: ChatRequest) -> Self {
        Self {
            provider,
            request,
            session_id: None,
            tool_results: None,
        }
    }

    fn carries_continuation(&self) -> bool {
        self.session_id.is_some() || self.tool_results.is_some()
    }
}

/// Inputs of one round after validation and credential resolution.
#[derive(Debug, Clone)]
pub(crate) struct RoundPlan {
    pub provider: ProviderConfig,
    pub ctx: InvocationContext,
    pub request: ChatRequest,
}

/// What a round does with the session store when it ends.
pub(crate) trait RoundHandoff: Send + Sync + 'static {
    /// Persist a tool-use stop and return the id clients resume with.
    fn suspend(
        &self,
        sessions: &SessionStore,
        plan: &RoundPlan,
        response: &CompletionResponse,
    ) -> Result<SessionId, RelayError>;

    /// The conversation can no longer be resumed.
    fn finish(&self, sessions: &SessionStore);

    /// Tool results folded into this round.
    fn tool_results(&self) -> Vec<ToolResult>;
}

/// Handoff of a round that has no session yet.
#[derive(Debug)]
struct FreshRound;

impl RoundHandoff for FreshRound {
    fn suspend(
        &self,
        sessions: &SessionStore,
        plan: &RoundPlan,
        response: &CompletionResponse,
    ) -> Result<SessionId, RelayError> {
        let state = SessionState {
            raw_assistant_text: response.raw_assistant_text.clone(),
            content_blocks: response.content.clone(),
            pending_tool_calls: response.tool_calls.clone(),
            tool_results: Vec::new(),
            usage: response.usage,
        };
        let session = sessions.create(plan.provider.clone(), plan.request.clone(), state);
        Ok(session.id)
    }

    fn finish(&self, _sessions: &SessionStore) {}

    fn tool_results(&self) -> Vec<ToolResult> {
        Vec::new()
    }
}

/// Forwards collaborator callbacks into the round's channel.
///
/// A closed channel means the client went away; the round's token is
/// cancelled so the collaborator stops at its next suspension point.
struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
}

impl InvocationSink for ChannelSink {
    fn emit(&self, event: InvocationEvent) {
        if self.tx.send(event.into()).is_err() && !self.cancel.is_cancelled() {
            debug!("Event receiver dropped, cancelling round");
            self.cancel.cancel();
        }
    }
}

/// Runs rounds against the model invoker and owns the shared stores.
#[derive(Debug, Clone)]
pub struct StreamDriver {
    invoker: Arc<dyn ModelInvoker>,
    sessions: Arc<SessionStore>,
    streams: Arc<StreamRegistry>,
    keys: Arc<ProviderKeys>,
}

impl StreamDriver {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        sessions: Arc<SessionStore>,
        streams: Arc<StreamRegistry>,
        keys: Arc<ProviderKeys>,
    ) -> Self {
        Self {
            invoker,
            sessions,
            streams,
            keys,
        }
    }

    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    #[must_use]
    pub const fn streams(&self) -> &Arc<StreamRegistry> {
        &self.streams
    }

    #[must_use]
    pub const fn keys(&self) -> &Arc<ProviderKeys> {
        &self.keys
    }

    /// Start a fresh round.
    ///
    /// A request carrying continuation fields yields a stream holding a single
    /// `error` event; no stream is registered and the collaborator is not
    /// invoked.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the request is malformed or no credentials
    /// are available for the provider. Nothing has been streamed in that case.
    pub fn start(&self, start: StartRequest) -> Result<EventStream, RelayError> {
        if start.carries_continuation() {
            return Ok(Self::reject_continuation(start.session_id.as_deref()));
        }

        start.request.validate()?;
        let ctx = self.keys.resolve(&start.provider)?;
        let plan = RoundPlan {
            provider: start.provider,
            ctx,
            request: start.request,
        };
        Ok(self.spawn_round(plan, FreshRound))
    }

    /// Stream holding the single `error` event sent when continuation data
    /// reaches the fresh-stream entry point. Nothing is registered or invoked.
    pub fn reject_continuation(session_id: Option<&str>) -> EventStream {
        warn!(
            session_id = session_id.unwrap_or_default(),
            "Continuation data sent to the fresh-stream entry point"
        );
        single_event(StreamEvent::error(&misrouted_continuation()))
    }

    /// Run a request without streaming. Not registered, never creates a session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for malformed input or missing credentials,
    /// and the mapped collaborator error if the invocation fails.
    pub async fn complete(
        &self,
        provider: ProviderConfig,
        request: ChatRequest,
    ) -> Result<DonePayload, RelayError> {
        request.validate()?;
        let ctx = self.keys.resolve(&provider)?;
        let started = Instant::now();

        let outcome = self
            .invoker
            .complete(&ctx, &request, CancellationToken::new())
            .await
            .inspect_err(|err| warn!(provider = %ctx.provider, error = %err, "Completion failed"))?;

        Ok(match outcome {
            InvocationOutcome::Completed(response) => {
                payload::completed(response, ctx.provider, Vec::new(), started.elapsed())
            }
            InvocationOutcome::Aborted(partial) => payload::aborted(
                partial,
                &request.model,
                ctx.provider,
                Vec::new(),
                started.elapsed(),
            ),
        })
    }

    /// Cancel an in-flight round. Returns false if the stream is unknown or finished.
    pub fn abort(&self, stream_id: &StreamId) -> bool {
        self.streams.cancel(stream_id)
    }

    /// Register a stream, queue `stream_start` and run the round in the background.
    pub(crate) fn spawn_round<H: RoundHandoff>(&self, plan: RoundPlan, handoff: H) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = self.streams.register_guarded();
        let stream_id = guard.id().clone();

        debug!(
            stream_id = %stream_id,
            provider = %plan.provider.provider,
            model = %plan.request.model,
            byok = plan.provider.is_byok(),
            "Stream started"
        );
        // Receiver is alive, so this cannot fail.
        let _ = tx.send(StreamEvent::StreamStart { stream_id });

        tokio::spawn(run_round(
            Arc::clone(&self.invoker),
            Arc::clone(&self.sessions),
            guard,
            tx,
            plan,
            handoff,
        ));

        UnboundedReceiverStream::new(rx)
    }
}

/// Error for tool results sent anywhere but the continuation endpoint.
#[must_use]
pub fn misrouted_continuation() -> RelayError {
    RelayError::InvalidRequest(
        "Tool results must be sent to the stream continuation endpoint with a sessionId"
            .to_string(),
    )
}

fn single_event(event: StreamEvent) -> EventStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(event);
    UnboundedReceiverStream::new(rx)
}

async fn run_round<H: RoundHandoff>(
    invoker: Arc<dyn ModelInvoker>,
    sessions: Arc<SessionStore>,
    guard: StreamGuard,
    tx: mpsc::UnboundedSender<StreamEvent>,
    plan: RoundPlan,
    handoff: H,
) {
    let started = Instant::now();
    let cancel = guard.token();
    let sink = ChannelSink {
        tx: tx.clone(),
        cancel: cancel.clone(),
    };

    let invocation =
        AssertUnwindSafe(invoker.stream(&plan.ctx, &plan.request, &sink, cancel.clone()))
            .catch_unwind();
    tokio::pin!(invocation);

    // Cancel on client disconnect even while the collaborator is silent.
    let result = tokio::select! {
        biased;
        result = &mut invocation => result,
        () = tx.closed() => {
            debug!(stream_id = %guard.id(), "Event receiver dropped, cancelling round");
            cancel.cancel();
            invocation.await
        }
    };
    let result = result
        .unwrap_or_else(|_| Err(InvocationError::Upstream("model invoker panicked".to_string())));

    // Deregister before reading the token: any abort that reported success
    // has cancelled it by now, and later aborts find nothing.
    let stream_id = guard.id().clone();
    drop(guard);

    // Once aborted, the round ends as aborted however the collaborator returned.
    let result = match result {
        Err(err) if cancel.is_cancelled() => {
            debug!(stream_id = %stream_id, error = %err, "Invocation failed after cancellation");
            Ok(InvocationOutcome::Aborted(PartialResponse::default()))
        }
        Ok(InvocationOutcome::Completed(response)) if cancel.is_cancelled() => {
            debug!(stream_id = %stream_id, "Invocation completed after cancellation");
            Ok(InvocationOutcome::Aborted(response.into()))
        }
        other => other,
    };

    let conclusion = conclude(&sessions, &plan, &handoff, result, started.elapsed(), &stream_id);
    for event in conclusion.events {
        if tx.send(event).is_err() {
            debug!(stream_id = %stream_id, "Client gone before terminal event");
            break;
        }
    }
    if conclusion.ends_conversation {
        handoff.finish(&sessions);
    }
}

struct Conclusion {
    events: Vec<StreamEvent>,
    ends_conversation: bool,
}

fn conclude<H: RoundHandoff>(
    sessions: &SessionStore,
    plan: &RoundPlan,
    handoff: &H,
    result: Result<InvocationOutcome, InvocationError>,
    elapsed: Duration,
    stream_id: &StreamId,
) -> Conclusion {
    let provider = plan.provider.provider;
    match result {
        Ok(InvocationOutcome::Completed(response)) if response.requires_tool_results() => {
            match handoff.suspend(sessions, plan, &response) {
                Ok(session_id) => {
                    debug!(
                        stream_id = %stream_id,
                        session_id = %session_id,
                        tool_calls = response.tool_calls.len(),
                        "Round suspended for tool use"
                    );
                    let calls = response.tool_calls.clone();
                    let done = payload::completed(response, provider, handoff.tool_results(), elapsed);
                    Conclusion {
                        events: vec![
                            StreamEvent::ToolCalls { calls, session_id },
                            StreamEvent::Done(Box::new(done)),
                        ],
                        ends_conversation: false,
                    }
                }
                Err(err) => {
                    warn!(stream_id = %stream_id, error = %err, "Could not suspend round");
                    Conclusion {
                        events: vec![StreamEvent::error(&err)],
                        ends_conversation: false,
                    }
                }
            }
        }
        Ok(InvocationOutcome::Completed(response)) => {
            debug!(
                stream_id = %stream_id,
                stop_reason = ?response.stop_reason,
                "Round completed"
            );
            let done = payload::completed(response, provider, handoff.tool_results(), elapsed);
            Conclusion {
                events: vec![StreamEvent::Done(Box::new(done))],
                ends_conversation: true,
            }
        }
        Ok(InvocationOutcome::Aborted(partial)) => {
            info!(stream_id = %stream_id, "Round aborted");
            let done = payload::aborted(
                partial,
                &plan.request.model,
                provider,
                handoff.tool_results(),
                elapsed,
            );
            Conclusion {
                events: vec![StreamEvent::Done(Box::new(done))],
                ends_conversation: true,
            }
        }
        Err(err) => {
            warn!(stream_id = %stream_id, provider = %provider, error = %err, "Invocation failed");
            Conclusion {
                events: vec![StreamEvent::error(&RelayError::from(err))],
                ends_conversation: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_core::testing::{ScriptedInvoker, ScriptedRound};
    use relay_core::{Message, Provider, Usage};
    use tokio_stream::StreamExt;

    use super::*;

    fn driver(invoker: ScriptedInvoker) -> StreamDriver {
        StreamDriver::new(
            Arc::new(invoker),
            Arc::new(SessionStore::new(Duration::from_secs(300))),
            Arc::new(StreamRegistry::new()),
            Arc::new(ProviderKeys::new().with_key(Provider::OpenAi, "sk-server")),
        )
    }

    fn start() -> StartRequest {
        StartRequest::new(
            ProviderConfig::new(Provider::OpenAi, None),
            ChatRequest::new("gpt-4o-mini", vec![Message::user("hi")]),
        )
    }

    #[tokio::test]
    async fn test_stream_start_is_first_and_done_is_last() {
        let driver = driver(ScriptedInvoker::new([ScriptedRound::end_turn(
            "Hello",
            Usage::new(2, 1),
        )]));
        let events: Vec<_> = driver.start(start()).unwrap().collect().await;

        assert!(matches!(events.first(), Some(StreamEvent::StreamStart { .. })));
        assert!(matches!(events.last(), Some(StreamEvent::Done(_))));
        assert_eq!(driver.streams().size(), 0);
        assert_eq!(driver.sessions().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_streaming() {
        let driver = StreamDriver::new(
            Arc::new(ScriptedInvoker::default()),
            Arc::new(SessionStore::new(Duration::from_secs(300))),
            Arc::new(StreamRegistry::new()),
            Arc::new(ProviderKeys::new()),
        );
        let err = driver.start(start()).unwrap_err();
        assert_eq!(err.code(), relay_core::ErrorCode::InvalidRequest);
        assert_eq!(driver.streams().size(), 0);
    }
}
