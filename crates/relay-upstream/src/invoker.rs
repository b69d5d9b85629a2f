//! `ModelInvoker` implementation for OpenAI-compatible providers.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use relay_core::{
    ChatRequest, InvocationContext, InvocationError, InvocationOutcome, InvocationSink,
    ModelInvoker, PartialResponse,
};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::convert::{from_wire_response, to_wire_request};
use crate::error::UpstreamError;
use crate::models::{ChatCompletionChunk, ChatCompletionResponse};
use crate::stream::{SseData, SseLineBuffer, StreamAccumulator};

/// Default connect timeout for provider calls.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls `{base_url}/chat/completions` with bearer credentials.
#[derive(Debug, Clone)]
pub struct OpenAiCompatInvoker {
    client: Client,
}

impl Default for OpenAiCompatInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatInvoker {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Use a preconfigured client (proxies, custom timeouts).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        ctx: &InvocationContext,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = format!("{}/chat/completions", ctx.base_url.trim_end_matches('/'));
        let body = to_wire_request(request, stream);
        debug!(
            provider = %ctx.provider,
            model = %request.model,
            stream,
            "Calling provider"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(ctx.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = UpstreamError::from_status(status, &text);
            warn!(provider = %ctx.provider, %status, "Provider call failed");
            return Err(err);
        }
        Ok(response)
    }

    async fn complete_inner(
        &self,
        ctx: &InvocationContext,
        request: &ChatRequest,
    ) -> Result<InvocationOutcome, UpstreamError> {
        let response = self.send(ctx, request, false).await?;
        let bytes = response.bytes().await?;
        let body: ChatCompletionResponse = serde_json::from_slice(&bytes)?;
        Ok(InvocationOutcome::Completed(from_wire_response(
            body,
            &request.model,
        )))
    }
}

#[async_trait]
impl ModelInvoker for OpenAiCompatInvoker {
    async fn complete(
        &self,
        ctx: &InvocationContext,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(InvocationOutcome::Aborted(PartialResponse::default())),
            result = self.complete_inner(ctx, request) => result.map_err(InvocationError::from),
        }
    }

    async fn stream(
        &self,
        ctx: &InvocationContext,
        request: &ChatRequest,
        sink: &dyn InvocationSink,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, InvocationError> {
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Ok(InvocationOutcome::Aborted(PartialResponse::default()));
            }
            result = self.send(ctx, request, true) => result?,
        };

        let mut bytes = response.bytes_stream();
        let mut lines = SseLineBuffer::default();
        let mut acc = StreamAccumulator::new(sink, &request.model);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(provider = %ctx.provider, "Stream cancelled mid-flight");
                    return Ok(InvocationOutcome::Aborted(acc.partial()));
                }
                next = bytes.next() => next,
            };

            let Some(chunk) = next else {
                // Some providers close the body without a [DONE] marker.
                return Ok(InvocationOutcome::Completed(acc.finish()));
            };
            lines.extend(&chunk.map_err(UpstreamError::from)?);

            while let Some(data) = lines.next_data() {
                match data {
                    SseData::Done => return Ok(InvocationOutcome::Completed(acc.finish())),
                    SseData::Json(json) => match serde_json::from_str::<ChatCompletionChunk>(&json)
                    {
                        Ok(parsed) => acc.push(parsed),
                        Err(e) => {
                            if let Some(err) = upstream_error_frame(&json) {
                                return Err(err.into());
                            }
                            warn!(error = %e, "Skipping unparseable stream chunk");
                        }
                    },
                }
            }
        }
    }
}

/// Some providers report failures mid-stream as `data: {"error": {...}}`.
fn upstream_error_frame(json: &str) -> Option<UpstreamError> {
    let frame: crate::models::ErrorResponse = serde_json::from_str(json).ok()?;
    Some(UpstreamError::Status {
        status: reqwest::StatusCode::BAD_GATEWAY,
        message: frame.error.message,
    })
}
