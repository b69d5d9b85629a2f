//! Shared harness for driver and continuation scenarios.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use relay_core::testing::{ManualClock, ScriptedInvoker, ScriptedRound};
use relay_core::{
    ChatRequest, Message, Provider, ProviderConfig, ProviderKeys, SessionStore, StreamEvent,
    StreamRegistry, ToolCall,
};
use relay_stream::{ContinuationCoordinator, EventStream, StartRequest, StreamDriver};
use tokio_stream::StreamExt;

pub const TTL: Duration = Duration::from_secs(300);

pub struct Harness {
    pub driver: Arc<StreamDriver>,
    pub coordinator: ContinuationCoordinator,
    pub invoker: Arc<ScriptedInvoker>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(rounds: impl IntoIterator<Item = ScriptedRound>) -> Self {
        let invoker = Arc::new(ScriptedInvoker::new(rounds));
        let clock = Arc::new(ManualClock::new());
        let driver = Arc::new(StreamDriver::new(
            invoker.clone(),
            Arc::new(SessionStore::with_clock(TTL, clock.clone())),
            Arc::new(StreamRegistry::new()),
            Arc::new(ProviderKeys::new().with_key(Provider::OpenAi, "sk-server")),
        ));
        Self {
            coordinator: ContinuationCoordinator::new(Arc::clone(&driver)),
            driver,
            invoker,
            clock,
        }
    }

    pub fn sessions(&self) -> usize {
        self.driver.sessions().count()
    }

    pub fn streams(&self) -> usize {
        self.driver.streams().size()
    }

    /// Poll until no stream is registered.
    pub async fn wait_for_idle(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.streams() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("streams never drained");
    }
}

pub fn fresh() -> StartRequest {
    StartRequest::new(
        ProviderConfig::new(Provider::OpenAi, None),
        ChatRequest::new("gpt-4o-mini", vec![Message::user("What's the weather?")]),
    )
}

pub fn call(id: &str, name: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        input: serde_json::json!({ "city": "Lisbon" }),
    }
}

pub async fn collect(stream: EventStream) -> Vec<StreamEvent> {
    stream.collect().await
}

pub fn names(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(StreamEvent::name).collect()
}

pub fn position(events: &[StreamEvent], name: &str) -> Option<usize> {
    events.iter().position(|e| e.name() == name)
}
