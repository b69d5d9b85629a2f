//! Mapping between relay domain types and the chat-completions wire format.

use relay_core::{
    ChatRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason,
    ToolCall, Usage,
};

use crate::models;
use crate::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, FunctionDefinition,
    StreamOptions, ToolCallFunction, ToolDefinition, Usage as WireUsage,
};

/// Build the upstream request body.
pub fn to_wire_request(request: &ChatRequest, stream: bool) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system.as_deref().filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: Some(system.to_string()),
            ..ChatMessage::default()
        });
    }
    for message in &request.messages {
        push_wire_messages(&mut messages, message);
    }

    let tools = (!request.tools.is_empty()).then(|| {
        request
            .tools
            .iter()
            .map(|tool| ToolDefinition {
                r#type: "function".to_string(),
                function: FunctionDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: Some(tool.input_schema.clone()),
                },
            })
            .collect()
    });

    let generation = &request.generation;
    ChatCompletionRequest {
        model: request.model.clone(),
        messages,
        temperature: generation.temperature,
        top_p: generation.top_p,
        max_tokens: generation.max_tokens,
        stream,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
        stop: (!generation.stop_sequences.is_empty()).then(|| generation.stop_sequences.clone()),
        tools,
        tool_choice: request.tool_choice.clone(),
    }
}

/// One domain message can become several wire messages: tool results travel
/// as separate `tool` role messages.
fn push_wire_messages(out: &mut Vec<ChatMessage>, message: &Message) {
    let blocks = match &message.content {
        MessageContent::Text(text) => {
            out.push(ChatMessage {
                role: message.role.as_str().to_string(),
                content: Some(text.clone()),
                ..ChatMessage::default()
            });
            return;
        }
        MessageContent::Blocks(blocks) => blocks,
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::Thinking { .. } => {}
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(models::ToolCall {
                id: id.clone(),
                r#type: "function".to_string(),
                function: ToolCallFunction {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let body = content.as_text();
                out.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(if *is_error {
                        format!("Error: {body}")
                    } else {
                        body
                    }),
                    tool_call_id: Some(tool_use_id.clone()),
                    ..ChatMessage::default()
                });
            }
        }
    }

    match message.role {
        Role::Assistant if !text.is_empty() || !tool_calls.is_empty() => {
            out.push(ChatMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                ..ChatMessage::default()
            });
        }
        Role::User if !text.is_empty() => out.push(ChatMessage {
            role: "user".to_string(),
            content: Some(text),
            ..ChatMessage::default()
        }),
        _ => {}
    }
}

/// Parse streamed or returned tool arguments. Invalid JSON is kept as a string.
pub fn parse_arguments(arguments: &str) -> serde_json::Value {
    if arguments.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(arguments)
        .unwrap_or_else(|_| serde_json::Value::String(arguments.to_string()))
}

pub fn stop_reason(finish_reason: Option<&str>, has_tool_calls: bool) -> StopReason {
    if has_tool_calls {
        return StopReason::ToolUse;
    }
    match finish_reason {
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls" | "function_call") => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    }
}

pub fn to_usage(usage: Option<WireUsage>) -> Usage {
    let Some(usage) = usage else {
        return Usage::default();
    };
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        cache_creation_input_tokens: None,
        cache_read_input_tokens: usage.prompt_tokens_details.and_then(|d| d.cached_tokens),
    }
}

/// Convert a non-streaming response.
pub fn from_wire_response(
    response: ChatCompletionResponse,
    requested_model: &str,
) -> CompletionResponse {
    let model = if response.model.is_empty() {
        requested_model.to_string()
    } else {
        response.model
    };
    let usage = to_usage(response.usage);
    let Some(choice) = response.choices.into_iter().next() else {
        return CompletionResponse {
            content: Vec::new(),
            raw_assistant_text: String::new(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage,
            model,
        };
    };

    let message = choice.message;
    let mut content = Vec::new();
    if let Some(thinking) = message.reasoning_content.filter(|t| !t.is_empty()) {
        content.push(ContentBlock::Thinking {
            thinking,
            signature: None,
        });
    }
    let text = message.content.unwrap_or_default();
    if !text.is_empty() {
        content.push(ContentBlock::text(text.clone()));
    }
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            input: parse_arguments(&call.function.arguments),
        })
        .collect();
    content.extend(tool_calls.iter().map(ToolCall::to_block));

    CompletionResponse {
        content,
        raw_assistant_text: text,
        stop_reason: stop_reason(choice.finish_reason.as_deref(), !tool_calls.is_empty()),
        tool_calls,
        usage,
        model,
    }
}
