use agentd_contract::{InputMessage, RecordStore, RunChunk};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{ExecError, RuntimeError};

/// Cooperative cancellation signal propagated into user generators and
/// checked by the runtime between chunks.
pub type RunCancellationToken = tokio_util::sync::CancellationToken;

/// A lazily-produced, cancellable chunk stream — the unit the user supplies.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<RunChunk, ExecError>> + Send>>;

/// A user agent. The one required capability is [`Agent::exec_run`]; the
/// seven HTTP-mapped operations are composed around it by
/// [`crate::AgentRuntime::bind`].
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Produce the chunk stream for one run. Implementations should react
    /// promptly to `cancel`; the runtime additionally stops draining between
    /// chunks once the token fires.
    fn exec_run(&self, input: Vec<InputMessage>, cancel: RunCancellationToken) -> ChunkStream;

    /// Optional store factory. When `None`, binding falls back to a file
    /// store rooted at `$TEGG_AGENT_DATA_DIR` (default `<cwd>/.agent-data`).
    fn store(&self) -> Option<Arc<dyn RecordStore>> {
        None
    }

    /// Called once after the store is initialized, before any traffic.
    async fn init(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Called during teardown, after in-flight runs have settled and the
    /// store has been destroyed.
    async fn shutdown(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}
