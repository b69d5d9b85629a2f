//! Router harness backed by a scripted model invoker.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;
use relay_axum::{AxumContext, ServerConfig, bootstrap_with_clock, create_router};
use relay_core::testing::{ManualClock, ScriptedInvoker, ScriptedRound};
use relay_core::{Provider, ProviderKeys};

pub const TEST_TOKEN: &str = "test-token-123";

pub struct TestApp {
    pub router: Router,
    pub ctx: AxumContext,
    pub invoker: Arc<ScriptedInvoker>,
    pub clock: Arc<ManualClock>,
}

/// Config with a server-side OpenAI key and no bearer gate.
pub fn test_config() -> ServerConfig {
    ServerConfig::with_defaults()
        .with_port(0)
        .with_session_ttl(Duration::from_secs(300))
        .with_provider_keys(ProviderKeys::new().with_key(Provider::OpenAi, "sk-server"))
}

impl TestApp {
    pub fn new(rounds: impl IntoIterator<Item = ScriptedRound>) -> Self {
        Self::with_config(test_config(), rounds)
    }

    /// An app whose invoker has nothing scripted.
    pub fn idle() -> Self {
        Self::new(Vec::<ScriptedRound>::new())
    }

    pub fn with_config(
        config: ServerConfig,
        rounds: impl IntoIterator<Item = ScriptedRound>,
    ) -> Self {
        let invoker = Arc::new(ScriptedInvoker::new(rounds));
        let clock = Arc::new(ManualClock::new());
        let ctx = bootstrap_with_clock(&config, invoker.clone(), clock.clone());
        Self {
            router: create_router(ctx.clone(), &config),
            ctx,
            invoker,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Poll until no stream is registered.
    pub async fn wait_for_idle(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.ctx.streams.size() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("streams never drained");
    }
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn stream_body(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "provider": "openai",
        "model": "gpt-4o-mini",
        "messages": [{"role": "user", "content": prompt}]
    })
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// One parsed SSE message.
#[derive(Debug, Clone)]
pub struct SseMessage {
    pub event: String,
    pub data: serde_json::Value,
}

/// Incremental SSE reader over a response body.
pub struct SseReader {
    body: Body,
    buffer: String,
}

impl SseReader {
    pub fn new(response: Response<Body>) -> Self {
        Self {
            body: response.into_body(),
            buffer: String::new(),
        }
    }

    /// Next message, or `None` once the body ends.
    pub async fn next(&mut self) -> Option<SseMessage> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(message) = parse_block(&block) {
                    return Some(message);
                }
                continue;
            }
            let frame = self.body.frame().await?.unwrap();
            if let Ok(data) = frame.into_data() {
                self.buffer.push_str(std::str::from_utf8(&data).unwrap());
            }
        }
    }

    pub async fn collect(mut self) -> Vec<SseMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.next().await {
            messages.push(message);
        }
        messages
    }
}

fn parse_block(block: &str) -> Option<SseMessage> {
    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_string());
        } else if let Some(chunk) = line.strip_prefix("data:") {
            data.push_str(chunk.trim_start());
        }
    }
    Some(SseMessage {
        event: event?,
        data: serde_json::from_str(&data).unwrap(),
    })
}

pub fn event_names(messages: &[SseMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.event.as_str()).collect()
}
