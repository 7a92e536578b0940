//! Run records and their lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{gen_run_id, now_unix_secs};
use crate::message::{InputMessage, Message};

fn run_object() -> String {
    "thread.run".to_string()
}

/// Run lifecycle status. Terminal statuses are sticky: a run that reaches
/// one never transitions out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Cancelling,
    Expired,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token accounting reported by the user generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl RunUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Terminal error recorded on a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

impl LastError {
    pub fn exec(message: impl Into<String>) -> Self {
        Self {
            code: "EXEC_ERROR".to_string(),
            message: message.into(),
        }
    }
}

/// Per-run execution knobs. Accepted and persisted; enforcement is left to
/// the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// One invocation of the agent generator, with full persisted lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    #[serde(default = "run_object")]
    pub object: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub status: RunStatus,
    pub input: Vec<InputMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<RunUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RunConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<u64>,
}

impl Run {
    /// A fresh queued run with a generated id.
    pub fn new(
        input: Vec<InputMessage>,
        thread_id: Option<String>,
        config: Option<RunConfig>,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            id: gen_run_id(),
            object: run_object(),
            created_at: now_unix_secs(),
            thread_id,
            status: RunStatus::Queued,
            input,
            output: None,
            last_error: None,
            usage: None,
            config,
            metadata,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            failed_at: None,
        }
    }
}

/// Partial run update applied by shallow merge. The immutable fields
/// (`id`, `object`, `created_at`, `input`) have no counterpart here, so a
/// patch cannot alter them.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub status: Option<RunStatus>,
    pub output: Option<Vec<Message>>,
    pub last_error: Option<LastError>,
    pub usage: Option<RunUsage>,
    pub metadata: Option<Map<String, Value>>,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub failed_at: Option<u64>,
}

impl RunPatch {
    /// Shallow-merge this patch into a run record.
    pub fn apply_to(self, run: &mut Run) {
        if let Some(status) = self.status {
            run.status = status;
        }
        if let Some(output) = self.output {
            run.output = Some(output);
        }
        if let Some(last_error) = self.last_error {
            run.last_error = Some(last_error);
        }
        if let Some(usage) = self.usage {
            run.usage = Some(usage);
        }
        if let Some(metadata) = self.metadata {
            run.metadata = Some(metadata);
        }
        if let Some(started_at) = self.started_at {
            run.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            run.completed_at = Some(completed_at);
        }
        if let Some(cancelled_at) = self.cancelled_at {
            run.cancelled_at = Some(cancelled_at);
        }
        if let Some(failed_at) = self.failed_at {
            run.failed_at = Some(failed_at);
        }
    }
}

/// Body of a run-creating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub input: RunInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RunConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// The message payload of a run-creating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInput {
    pub messages: Vec<InputMessage>,
}

impl CreateRunInput {
    pub fn from_messages(messages: Vec<InputMessage>) -> Self {
        Self {
            thread_id: None,
            input: RunInput { messages },
            config: None,
            metadata: None,
        }
    }
}
