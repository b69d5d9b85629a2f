//! Request and response bodies of the streaming endpoints.

use relay_core::{ApiKey, ChatRequest, Provider, ProviderConfig, SessionId, StreamId, ToolResult};
use relay_stream::{ContinueRequest, StartRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HttpError;

/// Keys that only belong on the continuation endpoint.
const CONTINUATION_KEYS: [&str; 4] = ["sessionId", "toolResults", "session_id", "tool_results"];

/// Body of `POST /api/v1/stream` and `POST /api/v1/complete`.
///
/// The chat request fields (`model`, `messages`, `system`, `tools`, ...) sit
/// at the top level next to the provider selection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequestDto {
    pub provider: Provider,
    /// Client-supplied provider key (BYOK). Falls back to the server key.
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    #[serde(flatten)]
    pub request: ChatRequest,
}

impl StreamRequestDto {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(self.provider, self.api_key.clone())
    }
}

impl From<StreamRequestDto> for StartRequest {
    fn from(dto: StreamRequestDto) -> Self {
        Self::new(dto.provider_config(), dto.request)
    }
}

/// A fresh-request body, checked for continuation data before the chat
/// request itself is parsed.
#[derive(Debug)]
pub enum StreamBody {
    Fresh(StreamRequestDto),
    /// Continuation data sent to a fresh-request endpoint.
    Misrouted { session_id: Option<String> },
}

impl StreamBody {
    /// Classify a raw JSON body.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when a body without continuation data is not a
    /// valid [`StreamRequestDto`].
    pub fn parse(body: Value) -> Result<Self, HttpError> {
        if carries_continuation(&body) {
            let session_id = ["sessionId", "session_id"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str))
                .map(str::to_string);
            return Ok(Self::Misrouted { session_id });
        }
        serde_json::from_value(body)
            .map(Self::Fresh)
            .map_err(|e| HttpError::BadRequest(format!("Invalid request body: {e}")))
    }
}

fn carries_continuation(body: &Value) -> bool {
    CONTINUATION_KEYS
        .iter()
        .any(|key| body.get(*key).is_some_and(|v| !v.is_null()))
}

/// Body of `POST /api/v1/stream/continue`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueRequestDto {
    pub session_id: SessionId,
    #[serde(default)]
    pub tool_results: Option<Vec<ToolResult>>,
}

impl From<ContinueRequestDto> for ContinueRequest {
    fn from(dto: ContinueRequestDto) -> Self {
        Self {
            session_id: dto.session_id,
            tool_results: dto.tool_results,
        }
    }
}

/// Response of a successful abort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortResponseDto {
    pub aborted: bool,
    pub stream_id: StreamId,
}

#[cfg(test)]
mod tests {
    use relay_core::CredentialSource;

    use super::*;

    #[test]
    fn test_stream_request_flattens_chat_fields() {
        let dto: StreamRequestDto = serde_json::from_value(serde_json::json!({
            "provider": "openai",
            "apiKey": "sk-client",
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "hi"}],
            "system": "Be brief.",
            "maxTokens": 256
        }))
        .unwrap();

        assert_eq!(dto.request.model, "gpt-4o-mini");
        assert_eq!(dto.request.system.as_deref(), Some("Be brief."));
        assert_eq!(dto.request.generation.max_tokens, Some(256));

        let start = StartRequest::from(dto);
        assert_eq!(
            start.provider.credentials,
            CredentialSource::Client(ApiKey::new("sk-client"))
        );
    }

    #[test]
    fn test_blank_api_key_uses_server_fallback() {
        let dto: StreamRequestDto = serde_json::from_value(serde_json::json!({
            "provider": "anthropic",
            "apiKey": "  ",
            "model": "claude-sonnet",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();

        assert!(!dto.provider_config().is_byok());
    }

    #[test]
    fn test_continue_request_accepts_snake_case_results() {
        let dto: ContinueRequestDto = serde_json::from_value(serde_json::json!({
            "sessionId": "sess_1",
            "toolResults": [{"tool_use_id": "call_1", "content": "sunny"}]
        }))
        .unwrap();

        let request = ContinueRequest::from(dto);
        assert_eq!(request.session_id.as_str(), "sess_1");
        assert_eq!(request.tool_results.unwrap()[0].tool_call_id, "call_1");
    }

    #[test]
    fn test_continuation_body_is_misrouted_before_chat_fields_are_parsed() {
        let body = StreamBody::parse(serde_json::json!({
            "provider": "openai",
            "sessionId": "sess_123",
            "toolResults": [{"toolCallId": "call_1", "content": "x"}]
        }))
        .unwrap();

        let StreamBody::Misrouted { session_id } = body else {
            panic!("expected misrouted body");
        };
        assert_eq!(session_id.as_deref(), Some("sess_123"));
    }

    #[test]
    fn test_null_continuation_fields_are_ignored() {
        let body = StreamBody::parse(serde_json::json!({
            "provider": "openai",
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "hi"}],
            "sessionId": null
        }))
        .unwrap();
        assert!(matches!(body, StreamBody::Fresh(_)));
    }

    #[test]
    fn test_invalid_fresh_body_is_bad_request() {
        let err = StreamBody::parse(serde_json::json!({"provider": "openai"})).unwrap_err();
        assert!(matches!(err, HttpError::BadRequest(_)));
        assert!(err.to_string().contains("model"));
    }
}
