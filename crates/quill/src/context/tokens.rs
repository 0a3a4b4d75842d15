//! Character-count token estimation.
//!
//! Not a tokenizer: roughly four characters per token for natural-language
//! text, plus fixed overheads for tool-call metadata. Deterministic, so
//! truncation decisions are reproducible.

use crate::{Message, MessageRole};
use std::collections::BTreeMap;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Flat overhead for a tool message's `tool_call_id`.
pub const TOOL_CALL_ID_OVERHEAD: usize = 10;

/// Estimated token cost of raw text.
pub fn estimate_text(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Estimated token cost of one message.
pub fn estimate(message: &Message) -> usize {
    let mut tokens = message.content.as_deref().map_or(0, estimate_text);
    if let Some(calls) = &message.tool_calls {
        let serialized = serde_json::to_string(calls).unwrap_or_default();
        tokens += estimate_text(&serialized);
    }
    if message.tool_call_id.is_some() {
        tokens += TOOL_CALL_ID_OVERHEAD;
    }
    tokens
}

/// Total estimated tokens of a log, and the same total split by role.
pub fn estimate_log(log: &[Message]) -> (usize, BTreeMap<MessageRole, usize>) {
    let mut breakdown = BTreeMap::new();
    let mut total = 0;
    for message in log {
        let tokens = estimate(message);
        total += tokens;
        *breakdown.entry(message.role).or_insert(0) += tokens;
    }
    (total, breakdown)
}
