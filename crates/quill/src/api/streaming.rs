//! Server-Sent Events (SSE) streaming for OpenAI-compatible chat completions.
//!
//! Provides [`StreamEvent`] and [`ChatClient::chat_stream_live`], which
//! reports each event to a callback as it comes off the wire. Tool-call
//! fragments arrive as [`StreamEvent::ToolCallDelta`] and are reassembled
//! with [`assemble_tool_calls`], then filtered with [`validate_tool_calls`]
//! before anything enters the conversation log.

use crate::{ApiError, ChatClient, ChatRequest, ToolCall, UsageInfo};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// A single event from an SSE stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// An incremental reasoning delta (reasoner models only).
    ReasoningDelta(String),
    /// A tool call fragment, keyed by its index in the response.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: String,
    },
    /// Token usage information (sent in the final chunk).
    Usage(UsageInfo),
    /// The stream is complete.
    Done,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
    #[serde(alias = "reasoning_content")]
    reasoning: Option<String>,
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Deserialize, Debug)]
struct StreamToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunctionDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

// ── Line decoder ───────────────────────────────────────────────────

/// Incremental SSE line decoder. Bytes may split lines (and UTF-8 sequences)
/// at arbitrary points; complete lines are decoded as they become available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns the events decoded from every complete line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while !self.done {
            let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.decode_line(&String::from_utf8_lossy(&line), &mut events);
        }
        events
    }

    /// Decode whatever is left in the buffer and close the stream. Always
    /// ends with [`StreamEvent::Done`].
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.done {
            let rest = std::mem::take(&mut self.buffer);
            self.decode_line(&String::from_utf8_lossy(&rest), &mut events);
        }
        if !self.done {
            self.done = true;
            events.push(StreamEvent::Done);
        }
        events
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        if line == "data: [DONE]" {
            self.done = true;
            events.push(StreamEvent::Done);
            return;
        }
        if let Some(data) = line.strip_prefix("data: ") {
            parse_sse_data(data, events);
        }
    }
}

// ── Client ─────────────────────────────────────────────────────────

impl ChatClient {
    /// Send a streaming chat request, invoking `on_event` for each event as
    /// it arrives off the wire. The full event list is also returned for
    /// assembly of text, tool calls and usage.
    pub async fn chat_stream_live(
        &self,
        body: &ChatRequest,
        mut on_event: impl FnMut(&StreamEvent),
    ) -> Result<Vec<StreamEvent>, ApiError> {
        let mut stream_body = serde_json::to_value(body)?;
        stream_body["stream"] = serde_json::Value::Bool(true);

        debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "sending streaming chat request"
        );

        let mut resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&stream_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, body });
        }

        let mut events = Vec::new();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = resp.chunk().await? {
            for ev in decoder.push(&chunk) {
                on_event(&ev);
                events.push(ev);
            }
            if decoder.is_done() {
                break;
            }
        }
        for ev in decoder.finish() {
            on_event(&ev);
            events.push(ev);
        }

        debug!(events = events.len(), "stream completed");
        Ok(events)
    }
}

/// Parse a single SSE `data:` payload into stream events.
fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(usage) = chunk.usage {
                events.push(StreamEvent::Usage(usage));
            }
            for choice in chunk.choices.into_iter().flatten() {
                if let Some(delta) = choice.delta {
                    if let Some(content) = delta.content
                        && !content.is_empty()
                    {
                        events.push(StreamEvent::TextDelta(content));
                    }
                    if let Some(reasoning) = delta.reasoning
                        && !reasoning.is_empty()
                    {
                        events.push(StreamEvent::ReasoningDelta(reasoning));
                    }
                    for tc in delta.tool_calls.into_iter().flatten() {
                        let (name, arguments) = match tc.function {
                            Some(f) => (f.name, f.arguments),
                            None => (None, None),
                        };
                        events.push(StreamEvent::ToolCallDelta {
                            index: tc.index.unwrap_or(0),
                            id: tc.id,
                            name,
                            arguments_delta: arguments.unwrap_or_default(),
                        });
                    }
                }
                if choice.finish_reason.is_some() {
                    trace!("stream finish_reason: {:?}", choice.finish_reason);
                }
            }
        }
        Err(e) => {
            warn!("failed to parse SSE chunk: {e}; data: {data}");
        }
    }
}

// ── Assembly ───────────────────────────────────────────────────────

/// Assemble the complete text from a sequence of stream events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(delta);
        }
    }
    text
}

/// Assemble the complete reasoning from a sequence of stream events.
pub fn collect_reasoning(events: &[StreamEvent]) -> String {
    let mut reasoning = String::new();
    for event in events {
        if let StreamEvent::ReasoningDelta(delta) = event {
            reasoning.push_str(delta);
        }
    }
    reasoning
}

/// Extract usage info from stream events (if present).
pub fn extract_usage(events: &[StreamEvent]) -> Option<UsageInfo> {
    events.iter().rev().find_map(|event| match event {
        StreamEvent::Usage(usage) => Some(usage.clone()),
        _ => None,
    })
}

/// Reassemble tool calls from their fragments, ordered by index. Missing ids
/// and names come out empty; [`validate_tool_calls`] drops those.
pub fn assemble_tool_calls(events: &[StreamEvent]) -> Vec<ToolCall> {
    let mut calls: BTreeMap<usize, (Option<String>, Option<String>, String)> = BTreeMap::new();

    for event in events {
        if let StreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments_delta,
        } = event
        {
            let entry = calls.entry(*index).or_insert((None, None, String::new()));
            if let Some(id) = id {
                entry.0 = Some(id.clone());
            }
            if let Some(name) = name {
                entry.1 = Some(name.clone());
            }
            entry.2.push_str(arguments_delta);
        }
    }

    calls
        .into_values()
        .map(|(id, name, args)| ToolCall::new(id.unwrap_or_default(), name.unwrap_or_default(), args))
        .collect()
}

/// Drop tool calls that cannot be answered: empty id, empty name, or
/// arguments that are non-empty but not valid JSON.
pub fn validate_tool_calls(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .filter(|call| {
            if call.id.is_empty() || call.function.name.is_empty() {
                warn!(
                    id = %call.id,
                    name = %call.function.name,
                    "dropping tool call without id or name"
                );
                return false;
            }
            let args = call.function.arguments.trim();
            if !args.is_empty() && serde_json::from_str::<serde_json::Value>(args).is_err() {
                warn!(
                    id = %call.id,
                    name = %call.function.name,
                    "dropping tool call with malformed arguments"
                );
                return false;
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> StreamEvent {
        StreamEvent::ToolCallDelta {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            arguments_delta: args.into(),
        }
    }

    #[test]
    fn collect_text_from_deltas() {
        let events = vec![
            StreamEvent::TextDelta("Hello ".into()),
            StreamEvent::TextDelta("world!".into()),
            StreamEvent::Done,
        ];
        assert_eq!(collect_text(&events), "Hello world!");
    }

    #[test]
    fn extract_usage_returns_none_when_missing() {
        let events = vec![StreamEvent::TextDelta("hi".into()), StreamEvent::Done];
        assert!(extract_usage(&events).is_none());
    }

    #[test]
    fn decoder_handles_split_lines() {
        let mut decoder = SseDecoder::new();
        let first = decoder.push(b"data: {\"choices\":[{\"delta\":{\"con");
        assert!(first.is_empty());
        let second = decoder.push(b"tent\":\"hi\"}}]}\n\n: keep-alive\n");
        assert_eq!(collect_text(&second), "hi");
        let rest = decoder.push(b"data: [DONE]\n");
        assert!(matches!(rest.as_slice(), [StreamEvent::Done]));
        assert!(decoder.is_done());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn decoder_finish_flushes_and_terminates() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"hmm\"}}]}");
        let events = decoder.finish();
        assert_eq!(collect_reasoning(&events), "hmm");
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
    }

    #[test]
    fn malformed_chunk_is_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {not json\n");
        assert!(events.is_empty());
    }

    #[test]
    fn tool_call_fragments_assemble_by_index() {
        let events = vec![
            delta(1, Some("b"), Some("git_status"), ""),
            delta(0, Some("a"), Some("read_file"), "{\"pa"),
            delta(0, None, None, "th\":\"x\"}"),
            delta(1, None, None, "{}"),
        ];
        let calls = assemble_tool_calls(&events);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[0].function.arguments, "{\"path\":\"x\"}");
        assert_eq!(calls[1].function.name, "git_status");
    }

    #[test]
    fn invalid_tool_calls_are_dropped() {
        let calls = vec![
            ToolCall::new("", "read_file", "{}"),
            ToolCall::new("c2", "", "{}"),
            ToolCall::new("c3", "read_file", "{\"path\":"),
            ToolCall::new("c4", "git_status", ""),
            ToolCall::new("c5", "read_file", "{\"path\":\"a\"}"),
        ];
        let kept: Vec<String> = validate_tool_calls(calls).into_iter().map(|c| c.id).collect();
        assert_eq!(kept, vec!["c4", "c5"]);
    }

    #[test]
    fn usage_chunk_is_reported() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n",
        );
        assert_eq!(extract_usage(&events).and_then(|u| u.total_tokens), Some(15));
    }
}
