//! SSE decoding and round accumulation for streamed chat completions.
//!
//! The upstream sends `data: {chunk}` lines terminated by `data: [DONE]`.
//! [`SseLineBuffer`] splits the byte stream into data payloads;
//! [`StreamAccumulator`] turns chunks into relay callbacks and keeps enough
//! state to build either the final response or a partial one on abort.

use std::collections::BTreeMap;

use bytes::BytesMut;
use relay_core::{
    BlockType, ChunkKind, CompletionResponse, ContentBlock, InvocationEvent, InvocationSink,
    PartialResponse, ToolCall, Usage,
};
use tracing::trace;

use crate::convert::{parse_arguments, stop_reason, to_usage};
use crate::models::ChatCompletionChunk;

/// One decoded SSE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Json(String),
    Done,
}

/// Incremental splitter of an SSE byte stream into `data:` payloads.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: BytesMut,
}

impl SseLineBuffer {
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete data payload, skipping comments and other fields.
    pub fn next_data(&mut self) -> Option<SseData> {
        while let Some(line_end) = find_newline(&self.buf) {
            let line = self.buf.split_to(line_end);
            let line = String::from_utf8_lossy(&line);
            let trimmed = line.trim();

            // Skip empty lines and SSE comments.
            if trimmed.is_empty() || trimmed.starts_with(':') {
                continue;
            }
            if let Some(data) = trimmed.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    return Some(SseData::Done);
                }
                return Some(SseData::Json(data.to_string()));
            }
        }
        None
    }
}

/// Find the next newline in the buffer, returning the position after it.
fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

#[derive(Debug)]
struct Block {
    block_type: BlockType,
    text: String,
    /// Tool call id and name for `ToolUse` blocks.
    tool: Option<(String, String)>,
    complete: bool,
}

impl Block {
    fn content(&self) -> ContentBlock {
        match self.block_type {
            BlockType::Text => ContentBlock::text(self.text.clone()),
            BlockType::Thinking => ContentBlock::Thinking {
                thinking: self.text.clone(),
                signature: None,
            },
            BlockType::ToolUse => {
                let (id, name) = self.tool.clone().unwrap_or_default();
                ContentBlock::ToolUse {
                    id,
                    name,
                    input: parse_arguments(&self.text),
                }
            }
        }
    }
}

/// Builds one round out of streamed chunks, reporting progress to a sink.
pub struct StreamAccumulator<'a> {
    sink: &'a dyn InvocationSink,
    blocks: Vec<Block>,
    /// Index of the open text or thinking block.
    open: Option<usize>,
    /// Wire tool-call index to block index.
    tools: BTreeMap<u32, usize>,
    raw_text: String,
    pre_tool_sent: bool,
    usage: Usage,
    model: String,
    finish_reason: Option<String>,
}

impl<'a> StreamAccumulator<'a> {
    pub fn new(sink: &'a dyn InvocationSink, requested_model: &str) -> Self {
        Self {
            sink,
            blocks: Vec::new(),
            open: None,
            tools: BTreeMap::new(),
            raw_text: String::new(),
            pre_tool_sent: false,
            usage: Usage::default(),
            model: requested_model.to_string(),
            finish_reason: None,
        }
    }

    pub fn push(&mut self, chunk: ChatCompletionChunk) {
        if let Some(model) = chunk.model.filter(|m| !m.is_empty()) {
            self.model = model;
        }
        for choice in chunk.choices.into_iter().take(1) {
            let delta = choice.delta;
            if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                self.append_text(BlockType::Thinking, &reasoning);
            }
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                self.append_text(BlockType::Text, &content);
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call
                    .function
                    .map(|f| (f.name, f.arguments))
                    .unwrap_or_default();
                self.append_tool(call.index, call.id, name, arguments);
            }
            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }
        if let Some(usage) = chunk.usage {
            self.usage = to_usage(Some(usage));
            self.sink.emit(InvocationEvent::Usage(self.usage));
        }
    }

    fn start_block(&mut self, block_type: BlockType, tool: Option<(String, String)>) -> usize {
        let index = self.blocks.len();
        self.blocks.push(Block {
            block_type,
            text: String::new(),
            tool,
            complete: false,
        });
        self.sink.emit(InvocationEvent::BlockStart { index, block_type });
        index
    }

    fn complete_block(&mut self, index: usize) {
        let Some(block) = self.blocks.get_mut(index) else {
            return;
        };
        if block.complete {
            return;
        }
        block.complete = true;
        let content = block.content();
        let block_type = block.block_type;
        self.sink.emit(InvocationEvent::BlockComplete {
            index,
            block_type,
            content: Some(content),
        });
    }

    fn append_text(&mut self, block_type: BlockType, text: &str) {
        let index = match self.open {
            Some(index) if self.blocks[index].block_type == block_type => index,
            open => {
                if let Some(previous) = open {
                    self.complete_block(previous);
                }
                let index = self.start_block(block_type, None);
                self.open = Some(index);
                index
            }
        };
        self.blocks[index].text.push_str(text);

        let (kind, visible) = match block_type {
            BlockType::Thinking => (ChunkKind::Thinking, false),
            _ => {
                self.raw_text.push_str(text);
                (ChunkKind::Text, true)
            }
        };
        self.sink.emit(InvocationEvent::Chunk {
            text: text.to_string(),
            kind,
            visible,
            block_index: Some(index),
        });
    }

    fn append_tool(
        &mut self,
        wire_index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        let index = if let Some(&index) = self.tools.get(&wire_index) {
            index
        } else {
            if let Some(open) = self.open.take() {
                self.complete_block(open);
            }
            if !self.pre_tool_sent && !self.raw_text.is_empty() {
                self.pre_tool_sent = true;
                self.sink.emit(InvocationEvent::PreToolContent {
                    text: self.raw_text.clone(),
                });
            }
            let index = self.start_block(BlockType::ToolUse, Some(Default::default()));
            self.tools.insert(wire_index, index);
            index
        };

        let block = &mut self.blocks[index];
        if let Some((tool_id, tool_name)) = block.tool.as_mut() {
            if let Some(id) = id.filter(|i| !i.is_empty()) {
                *tool_id = id;
            }
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                tool_name.push_str(&name);
            }
        }
        if let Some(arguments) = arguments.filter(|a| !a.is_empty()) {
            block.text.push_str(&arguments);
            self.sink.emit(InvocationEvent::Chunk {
                text: arguments,
                kind: ChunkKind::ToolInput,
                visible: false,
                block_index: Some(index),
            });
        }
    }

    fn close_all(&mut self) {
        for index in 0..self.blocks.len() {
            self.complete_block(index);
        }
        self.open = None;
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.blocks
            .iter()
            .filter(|b| b.block_type == BlockType::ToolUse)
            .filter_map(|b| match b.content() {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall { id, name, input }),
                _ => None,
            })
            .collect()
    }

    /// Close open blocks and produce the finished round.
    pub fn finish(mut self) -> CompletionResponse {
        self.close_all();
        let tool_calls = self.tool_calls();
        trace!(
            blocks = self.blocks.len(),
            tool_calls = tool_calls.len(),
            finish_reason = ?self.finish_reason,
            "Stream finished"
        );
        CompletionResponse {
            content: self.blocks.iter().map(Block::content).collect(),
            raw_assistant_text: self.raw_text,
            stop_reason: stop_reason(self.finish_reason.as_deref(), !tool_calls.is_empty()),
            tool_calls,
            usage: self.usage,
            model: self.model,
        }
    }

    /// Whatever was produced so far. Incomplete tool calls are dropped.
    pub fn partial(self) -> PartialResponse {
        PartialResponse {
            content: self
                .blocks
                .iter()
                .filter(|b| b.block_type != BlockType::ToolUse)
                .map(Block::content)
                .collect(),
            raw_assistant_text: self.raw_text,
            usage: self.usage,
        }
    }
}
