use agentd_contract::{
    InputMessage, Message, RecordStore, Run, RunConfig, RunPatch, StoreError, Thread,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory store for testing and local development.
#[derive(Default)]
pub struct MemoryStore {
    threads: RwLock<HashMap<String, Thread>>,
    runs: RwLock<HashMap<String, Run>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_thread(
        &self,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Thread, StoreError> {
        let thread = Thread::new(metadata);
        self.threads
            .write()
            .await
            .insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, StoreError> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))
    }

    async fn append_messages(
        &self,
        thread_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(thread_id)
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        thread.messages.extend(messages);
        Ok(())
    }

    async fn create_run(
        &self,
        input: Vec<InputMessage>,
        thread_id: Option<String>,
        config: Option<RunConfig>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Run, StoreError> {
        let run = Run::new(input, thread_id, config, metadata);
        self.runs.write().await.insert(run.id.clone(), run.clone());
        Ok(run)
    }

    async fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }

    async fn update_run(&self, run_id: &str, patch: RunPatch) -> Result<Run, StoreError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        patch.apply_to(run);
        Ok(run.clone())
    }
}
