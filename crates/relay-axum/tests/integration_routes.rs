//! Integration tests for the relay routes.
//!
//! These tests drive the full router with `tower::ServiceExt::oneshot` and a
//! scripted model invoker.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{SseReader, TestApp, event_names, get, json_body, post_json, stream_body};
use http_body_util::BodyExt;
use relay_core::testing::ScriptedRound;
use relay_core::{InvocationError, ToolCall, Usage};

fn call(id: &str, name: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        input: serde_json::json!({"city": "Lisbon"}),
    }
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let app = TestApp::idle();

    let response = app.send(get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn stream_endpoint_emits_ordered_sse_events() {
    let app = TestApp::new([ScriptedRound::end_turn("Sunny.", Usage::new(8, 2))]);

    let response = app.send(post_json("/api/v1/stream", stream_body("weather?"))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[axum::http::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let messages = SseReader::new(response).collect().await;
    assert_eq!(
        event_names(&messages),
        [
            "stream_start",
            "block_start",
            "chunk",
            "block_complete",
            "usage",
            "done"
        ]
    );
    assert!(messages[0].data["streamId"].as_str().unwrap().starts_with("str_"));
    let done = &messages.last().unwrap().data;
    assert_eq!(done["stopReason"], "end_turn");
    assert_eq!(done["rawAssistantText"], "Sunny.");
    assert_eq!(done["provider"], "openai");
    assert!(done.get("event").is_none());
}

#[tokio::test]
async fn tool_round_then_continuation_over_http() {
    let app = TestApp::new([
        ScriptedRound::tool_use(
            "Checking.",
            vec![call("call_1", "weather"), call("call_2", "time")],
            Usage::new(10, 5),
        ),
        ScriptedRound::end_turn("Sunny at noon.", Usage::new(3, 2)),
    ]);

    let response = app.send(post_json("/api/v1/stream", stream_body("weather?"))).await;
    let first = SseReader::new(response).collect().await;
    let names = event_names(&first);
    let tool_calls = names.iter().position(|n| *n == "tool_calls").unwrap();
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(tool_calls, names.len() - 2);

    let session_id = first[tool_calls].data["sessionId"].as_str().unwrap().to_string();
    assert_eq!(first[tool_calls].data["calls"].as_array().unwrap().len(), 2);
    assert_eq!(first.last().unwrap().data["requiresToolResults"], true);

    let stats = json_body(app.send(get("/api/v1/stats")).await).await;
    assert_eq!(stats, serde_json::json!({"sessions": 1, "streams": 0}));

    let summary = app
        .send(get(&format!("/api/v1/sessions/{session_id}")))
        .await;
    assert_eq!(summary.status(), StatusCode::OK);
    let summary = json_body(summary).await;
    assert_eq!(summary["pendingToolCalls"], serde_json::json!(["call_1", "call_2"]));
    assert_eq!(summary["byok"], false);
    assert!(summary.get("apiKey").is_none());

    let response = app
        .send(post_json(
            "/api/v1/stream/continue",
            serde_json::json!({
                "sessionId": session_id,
                "toolResults": [
                    {"toolCallId": "call_1", "content": "sunny"},
                    {"toolCallId": "call_2", "content": "12:00"}
                ]
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = SseReader::new(response).collect().await;
    let names = event_names(&second);
    assert_eq!(names.first(), Some(&"stream_start"));
    assert!(!names.contains(&"tool_calls"));
    let done = &second.last().unwrap().data;
    assert_eq!(done["stopReason"], "end_turn");
    assert_eq!(done["toolResults"].as_array().unwrap().len(), 2);

    let stats = json_body(app.send(get("/api/v1/stats")).await).await;
    assert_eq!(stats["sessions"], 0);
}

#[tokio::test]
async fn continue_with_unknown_session_is_404_json() {
    let app = TestApp::idle();

    let response = app
        .send(post_json(
            "/api/v1/stream/continue",
            serde_json::json!({
                "sessionId": "sess_missing",
                "toolResults": [{"toolCallId": "call_1", "content": "x"}]
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "session_not_found");
    assert_eq!(body["retryable"], false);
    assert_eq!(body["status"], 404);
    assert_eq!(app.invoker.calls(), 0);
}

#[tokio::test]
async fn continue_without_tool_results_is_400_and_keeps_session() {
    let app = TestApp::new([ScriptedRound::tool_use(
        "",
        vec![call("call_1", "weather")],
        Usage::new(1, 1),
    )]);
    let first = SseReader::new(app.send(post_json("/api/v1/stream", stream_body("x"))).await)
        .collect()
        .await;
    let session_id = first
        .iter()
        .find(|m| m.event == "tool_calls")
        .unwrap()
        .data["sessionId"]
        .clone();

    let response = app
        .send(post_json(
            "/api/v1/stream/continue",
            serde_json::json!({"sessionId": session_id}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_request");
    assert_eq!(app.ctx.sessions.count(), 1);
    assert_eq!(app.invoker.calls(), 1);
}

#[tokio::test]
async fn tool_results_on_fresh_endpoint_yield_error_event() {
    let app = TestApp::idle();
    let mut body = stream_body("x");
    body["toolResults"] = serde_json::json!([{"toolCallId": "call_1", "content": "x"}]);

    let response = app.send(post_json("/api/v1/stream", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let messages = SseReader::new(response).collect().await;
    assert_eq!(event_names(&messages), ["error"]);
    assert_eq!(messages[0].data["code"], "invalid_request");
    assert!(
        messages[0].data["message"]
            .as_str()
            .unwrap()
            .contains("continuation endpoint")
    );
    assert_eq!(app.invoker.calls(), 0);
    assert_eq!(app.ctx.streams.size(), 0);
}

#[tokio::test]
async fn continuation_body_on_fresh_endpoint_yields_error_event() {
    let app = TestApp::idle();
    let body = serde_json::json!({
        "provider": "openai",
        "sessionId": "sess_123",
        "toolResults": [{"toolCallId": "call_1", "content": "x"}]
    });

    let response = app.send(post_json("/api/v1/stream", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let messages = SseReader::new(response).collect().await;
    assert_eq!(event_names(&messages), ["error"]);
    assert_eq!(messages[0].data["code"], "invalid_request");
    assert_eq!(messages[0].data["retryable"], false);
    assert!(
        messages[0].data["message"]
            .as_str()
            .unwrap()
            .contains("continuation endpoint")
    );
    assert_eq!(app.invoker.calls(), 0);
    assert_eq!(app.ctx.streams.size(), 0);
}

#[tokio::test]
async fn continuation_body_on_complete_endpoint_is_400() {
    let app = TestApp::idle();
    let body = serde_json::json!({
        "provider": "openai",
        "sessionId": "sess_123",
        "toolResults": [{"toolCallId": "call_1", "content": "x"}]
    });

    let response = app.send(post_json("/api/v1/complete", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_request");
    assert!(body["error"].as_str().unwrap().contains("continuation endpoint"));
    assert_eq!(app.invoker.calls(), 0);
}

#[tokio::test]
async fn fresh_body_without_model_is_400_json() {
    let app = TestApp::idle();
    let body = serde_json::json!({
        "provider": "openai",
        "messages": [{"role": "user", "content": "hi"}]
    });

    let response = app.send(post_json("/api/v1/stream", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_request");
    assert!(body["error"].as_str().unwrap().contains("model"));
    assert_eq!(app.ctx.streams.size(), 0);
}

#[tokio::test]
async fn malformed_body_is_400_json() {
    let app = TestApp::idle();

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/stream")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_request");
}

#[tokio::test]
async fn missing_credentials_are_rejected_before_streaming() {
    let app = TestApp::idle();
    let mut body = stream_body("x");
    body["provider"] = serde_json::json!("anthropic");

    let response = app.send(post_json("/api/v1/stream", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("ANTHROPIC_API_KEY"));
}

#[tokio::test]
async fn abort_endpoint_cancels_stream_and_reports_partial_done() {
    let app = TestApp::new([ScriptedRound::until_cancelled("Partial ans")]);

    let response = app.send(post_json("/api/v1/stream", stream_body("x"))).await;
    let mut reader = SseReader::new(response);
    let start = reader.next().await.unwrap();
    assert_eq!(start.event, "stream_start");
    let stream_id = start.data["streamId"].as_str().unwrap().to_string();

    let abort_uri = format!("/api/v1/stream/{stream_id}/abort");
    let response = app.send(post_json(&abort_uri, serde_json::json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"aborted": true, "streamId": stream_id}));

    let rest = reader.collect().await;
    let done = &rest.last().unwrap();
    assert_eq!(done.event, "done");
    assert_eq!(done.data["stopReason"], "end_turn");
    assert_eq!(done.data["aborted"], true);
    assert_eq!(done.data["rawAssistantText"], "Partial ans");

    let again = app.send(post_json(&abort_uri, serde_json::json!({}))).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(again).await["code"], "stream_not_found");
    assert_eq!(app.ctx.streams.size(), 0);
}

#[tokio::test]
async fn abort_unknown_stream_is_404() {
    let app = TestApp::idle();

    let response = app
        .send(post_json("/api/v1/stream/str_nope/abort", serde_json::json!({})))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "stream_not_found");
}

#[tokio::test]
async fn dropping_the_sse_body_deregisters_the_stream() {
    let app = TestApp::new([ScriptedRound::until_cancelled("")]);

    let response = app.send(post_json("/api/v1/stream", stream_body("x"))).await;
    let mut reader = SseReader::new(response);
    assert_eq!(reader.next().await.unwrap().event, "stream_start");
    assert_eq!(app.ctx.streams.size(), 1);

    drop(reader);
    app.wait_for_idle().await;
    assert_eq!(app.ctx.sessions.count(), 0);
}

#[tokio::test]
async fn delete_session_is_always_204() {
    let app = TestApp::idle();

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/sessions/sess_unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn expired_session_summary_is_404() {
    let app = TestApp::new([ScriptedRound::tool_use(
        "",
        vec![call("call_1", "weather")],
        Usage::new(1, 1),
    )]);
    let first = SseReader::new(app.send(post_json("/api/v1/stream", stream_body("x"))).await)
        .collect()
        .await;
    let session_id = first
        .iter()
        .find(|m| m.event == "tool_calls")
        .unwrap()
        .data["sessionId"]
        .as_str()
        .unwrap()
        .to_string();

    app.clock.advance(std::time::Duration::from_secs(301));
    let response = app
        .send(get(&format!("/api/v1/sessions/{session_id}")))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "session_not_found");
    assert_eq!(app.ctx.sessions.count(), 0);
}

#[tokio::test]
async fn complete_endpoint_returns_done_payload() {
    let app = TestApp::new([ScriptedRound::end_turn("Plain.", Usage::new(4, 2))]);

    let response = app.send(post_json("/api/v1/complete", stream_body("x"))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["rawAssistantText"], "Plain.");
    assert_eq!(body["usage"]["inputTokens"], 4);
    assert_eq!(app.ctx.streams.size(), 0);
    assert_eq!(app.ctx.sessions.count(), 0);
}

#[tokio::test]
async fn complete_endpoint_maps_upstream_errors() {
    let app = TestApp::new([ScriptedRound::failing(InvocationError::RateLimited(
        "slow down".into(),
    ))]);

    let response = app.send(post_json("/api/v1/complete", stream_body("x"))).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["code"], "rate_limit");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn failed_round_streams_error_event() {
    let app = TestApp::new([ScriptedRound::failing(InvocationError::Overloaded(
        "busy".into(),
    ))]);

    let response = app.send(post_json("/api/v1/stream", stream_body("x"))).await;
    let messages = SseReader::new(response).collect().await;

    assert_eq!(event_names(&messages), ["stream_start", "error"]);
    assert_eq!(messages[1].data["code"], "overloaded");
    assert_eq!(messages[1].data["retryable"], true);
    assert_eq!(app.ctx.streams.size(), 0);
}
