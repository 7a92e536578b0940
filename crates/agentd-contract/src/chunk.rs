//! The free-form chunk shape yielded by user generators.
//!
//! `type` is opaque to the runtime; behavior is driven purely by the
//! presence of `message` and `usage`. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// One part of a structured chunk message content array. Parts with a kind
/// other than `text` are preserved on the wire but skipped by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ChunkPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// Chunk message content: a bare string or an ordered part list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkContent {
    Text(String),
    Parts(Vec<ChunkPart>),
}

/// Message payload carried by a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: ChunkContent,
}

/// Incremental token accounting carried by a chunk. Missing counters
/// default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// One value yielded by the user generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunChunk {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChunkMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageDelta>,
}

impl RunChunk {
    /// An assistant-message chunk with a single text content part.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            kind: "assistant".to_string(),
            message: Some(ChunkMessage {
                role: Some("assistant".to_string()),
                content: ChunkContent::Parts(vec![ChunkPart::text(text)]),
            }),
            usage: None,
        }
    }

    /// A usage-reporting chunk.
    pub fn usage(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            kind: "result".to_string(),
            message: None,
            usage: Some(UsageDelta {
                prompt_tokens,
                completion_tokens,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunk_with_unknown_fields_parses() {
        let chunk: RunChunk = serde_json::from_value(json!({
            "type": "assistant",
            "message": {"role": "assistant", "content": "hello"},
            "trace_id": "abc123"
        }))
        .unwrap();
        assert_eq!(chunk.kind, "assistant");
        assert!(chunk.message.is_some());
        assert!(chunk.usage.is_none());
    }

    #[test]
    fn chunk_without_message_or_usage_is_a_noop_shape() {
        let chunk: RunChunk = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert!(chunk.message.is_none());
        assert!(chunk.usage.is_none());
    }

    #[test]
    fn usage_counters_default_to_zero() {
        let chunk: RunChunk = serde_json::from_value(json!({
            "type": "result",
            "usage": {"prompt_tokens": 7}
        }))
        .unwrap();
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.completion_tokens, 0);
    }
}
