//! The durable storage seam.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::message::{InputMessage, Message};
use crate::run::{Run, RunConfig, RunPatch};
use crate::thread::Thread;

/// Storage errors. `NotFound` variants are explicit sentinels, distinguished
/// from I/O failure so callers can map them to their own error surface.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Thread {0} not found")]
    ThreadNotFound(String),

    #[error("Run {0} not found")]
    RunNotFound(String),

    /// Empty id, or an id that would resolve outside the store's base
    /// directory.
    #[error("invalid record id: {0}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persistent mapping from thread id to [`Thread`] and run id to [`Run`].
///
/// The default implementation is a single-process file store; the trait
/// permits substitution with a locking backend for serious deployments.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Idempotent setup (directory creation and the like).
    async fn init(&self) -> Result<(), StoreError>;

    /// Optional teardown.
    async fn destroy(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Persist a fresh thread with a generated id and empty history.
    async fn create_thread(
        &self,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Thread, StoreError>;

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, StoreError>;

    /// Read-modify-write append, preserving the given order.
    async fn append_messages(
        &self,
        thread_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), StoreError>;

    /// Persist a fresh run with a generated id and `queued` status.
    async fn create_run(
        &self,
        input: Vec<InputMessage>,
        thread_id: Option<String>,
        config: Option<RunConfig>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Run, StoreError>;

    async fn get_run(&self, run_id: &str) -> Result<Run, StoreError>;

    /// Read, shallow-merge the patch, write. Returns the updated record.
    async fn update_run(&self, run_id: &str, patch: RunPatch) -> Result<Run, StoreError>;
}
