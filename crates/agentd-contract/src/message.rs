//! Message records shared by conversation history and run output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{gen_message_id, now_unix_secs};

fn message_object() -> String {
    "thread.message".to_string()
}

/// Role of a stored message. Thread history only ever contains these two;
/// `system` input messages are dropped before append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InProgress,
    Incomplete,
    Completed,
}

/// Text payload of a content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Value>,
}

/// A single content block. Text is the only supported kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: TextContent },
}

impl ContentBlock {
    pub fn text(value: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: TextContent {
                value: value.into(),
                annotations: Vec::new(),
            },
        }
    }
}

/// A stored message, used both for thread history and run output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default = "message_object")]
    pub object: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub role: Role,
    pub status: MessageStatus,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Message {
    /// A fresh message with a generated id and the current timestamp.
    pub fn new(role: Role, status: MessageStatus, content: Vec<ContentBlock>) -> Self {
        Self {
            id: gen_message_id(),
            object: message_object(),
            created_at: now_unix_secs(),
            thread_id: None,
            run_id: None,
            role,
            status,
            content,
            metadata: None,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// Role of a submitted input message. `system` entries are accepted on the
/// wire but never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    User,
    Assistant,
    System,
}

/// One part of a structured input content array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPart {
    Text { text: String },
}

/// Input message content: either a bare string or an ordered part list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputContent {
    Text(String),
    Parts(Vec<InputPart>),
}

/// A message as submitted by the client in a run request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: InputRole,
    pub content: InputContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl InputMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: InputRole::User,
            content: InputContent::Text(content.into()),
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: InputRole::Assistant,
            content: InputContent::Text(content.into()),
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: InputRole::System,
            content: InputContent::Text(content.into()),
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_block_serializes_to_wire_shape() {
        let block = ContentBlock::text("hello");
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(
            v,
            json!({"type": "text", "text": {"value": "hello", "annotations": []}})
        );
    }

    #[test]
    fn input_content_accepts_string_and_parts() {
        let m: InputMessage = serde_json::from_value(json!({
            "role": "user",
            "content": "Hi"
        }))
        .unwrap();
        assert_eq!(m.content, InputContent::Text("Hi".to_string()));

        let m: InputMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": [{"type": "text", "text": "Hi"}]
        }))
        .unwrap();
        assert_eq!(
            m.content,
            InputContent::Parts(vec![InputPart::Text {
                text: "Hi".to_string()
            }])
        );
    }

    #[test]
    fn message_defaults_carry_object_and_id_prefix() {
        let m = Message::new(Role::Assistant, MessageStatus::Completed, vec![]);
        assert_eq!(m.object, "thread.message");
        assert!(m.id.starts_with("msg_"));
        let v = serde_json::to_value(&m).unwrap();
        assert!(v.get("thread_id").is_none());
        assert_eq!(v["status"], "completed");
    }
}
