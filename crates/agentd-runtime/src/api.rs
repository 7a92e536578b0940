//! The seven-operation API surface.
//!
//! [`AgentRuntime`] provides the default composition. Overriding an
//! operation means implementing this trait by hand and delegating the rest
//! to a bound runtime; callers (the HTTP layer included) depend only on
//! `Arc<dyn AgentApi>`, so overrides and defaults are indistinguishable.

use agentd_contract::{CreateRunInput, Run, Thread};
use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::runtime::AgentRuntime;
use crate::stream::FrameStream;

#[async_trait]
pub trait AgentApi: Send + Sync {
    async fn create_thread(&self) -> Result<Thread, RuntimeError>;

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, RuntimeError>;

    /// Run to completion and return the terminal run.
    async fn sync_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError>;

    /// Accept the run, drain it in the background, return it still `queued`.
    async fn async_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError>;

    /// Start a run and return its SSE frame sequence.
    async fn stream_run(&self, input: CreateRunInput) -> Result<FrameStream, RuntimeError>;

    async fn get_run(&self, run_id: &str) -> Result<Run, RuntimeError>;

    async fn cancel_run(&self, run_id: &str) -> Result<Run, RuntimeError>;
}

#[async_trait]
impl AgentApi for AgentRuntime {
    async fn create_thread(&self) -> Result<Thread, RuntimeError> {
        AgentRuntime::create_thread(self).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, RuntimeError> {
        AgentRuntime::get_thread(self, thread_id).await
    }

    async fn sync_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        AgentRuntime::sync_run(self, input).await
    }

    async fn async_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        AgentRuntime::async_run(self, input).await
    }

    async fn stream_run(&self, input: CreateRunInput) -> Result<FrameStream, RuntimeError> {
        AgentRuntime::stream_run(self, input).await
    }

    async fn get_run(&self, run_id: &str) -> Result<Run, RuntimeError> {
        AgentRuntime::get_run(self, run_id).await
    }

    async fn cancel_run(&self, run_id: &str) -> Result<Run, RuntimeError> {
        AgentRuntime::cancel_run(self, run_id).await
    }
}
