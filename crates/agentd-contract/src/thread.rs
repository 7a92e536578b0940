//! Thread records: append-only conversation logs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{gen_thread_id, now_unix_secs};
use crate::message::Message;

fn thread_object() -> String {
    "thread".to_string()
}

/// An append-only conversation log. Threads are created explicitly or
/// implicitly by a run operation lacking a `thread_id`, and are never
/// destroyed by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default = "thread_object")]
    pub object: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: u64,
}

impl Thread {
    /// A fresh thread with a generated id, empty history, and the given
    /// (or empty) metadata.
    pub fn new(metadata: Option<Map<String, Value>>) -> Self {
        Self {
            id: gen_thread_id(),
            object: thread_object(),
            messages: Vec::new(),
            metadata: metadata.unwrap_or_default(),
            created_at: now_unix_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_thread_has_prefix_and_empty_history() {
        let t = Thread::new(None);
        assert!(t.id.starts_with("thread_"));
        assert_eq!(t.object, "thread");
        assert!(t.messages.is_empty());
        assert!(t.metadata.is_empty());
        assert!(t.created_at <= now_unix_secs());
    }

    #[test]
    fn thread_roundtrips_through_json() {
        let mut metadata = Map::new();
        metadata.insert("topic".to_string(), Value::String("demo".to_string()));
        let t = Thread::new(Some(metadata));
        let parsed: Thread = serde_json::from_str(&serde_json::to_string(&t).unwrap()).unwrap();
        assert_eq!(parsed.id, t.id);
        assert_eq!(parsed.created_at, t.created_at);
        assert_eq!(parsed.metadata["topic"], "demo");
    }
}
