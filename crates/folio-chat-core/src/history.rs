//! Validation of client-supplied conversation history.
//!
//! The chat endpoint accepts an optional `history` array of
//! `{role, content}` objects. Entries are untrusted: anything that is not a
//! well-formed turn is dropped silently, and only the most recent turns are
//! kept.

use serde_json::Value;

use crate::models::{ConversationTurn, Role};

/// Default number of prior turns forwarded to the pipeline.
pub const MAX_HISTORY_TURNS: usize = 10;

/// Extract valid turns from a raw `history` value and keep the last `max`.
///
/// Filtering happens before the cap, so malformed entries never consume a
/// slot. A missing or non-array value yields an empty history. Turns with
/// blank content are treated as malformed, since providers reject empty
/// message parts.
pub fn sanitize_history(raw: Option<&Value>, max: usize) -> Vec<ConversationTurn> {
    let entries = match raw.and_then(Value::as_array) {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    let mut turns: Vec<ConversationTurn> = entries.iter().filter_map(parse_turn).collect();

    if turns.len() > max {
        turns.drain(..turns.len() - max);
    }
    turns
}

fn parse_turn(entry: &Value) -> Option<ConversationTurn> {
    let role = entry.get("role").and_then(Value::as_str).and_then(Role::parse)?;
    let content = entry.get("content").and_then(Value::as_str)?;
    if content.trim().is_empty() {
        return None;
    }
    Some(ConversationTurn {
        role,
        content: content.to_string(),
    })
}
