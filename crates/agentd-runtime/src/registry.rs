//! The per-instance in-flight task registry.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::agent::RunCancellationToken;

struct InFlightTask {
    cancel: RunCancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Mapping from run id to the cancel handle and completion future of its
/// background execution. Entries exist exactly while a run is between
/// `queued` acceptance and the end of its background drain.
#[derive(Default)]
pub struct TaskRegistry {
    inner: Mutex<HashMap<String, InFlightTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a background task. The registry lock is held across the
    /// spawn and the insert, so the task's own finalization (which removes
    /// the entry) cannot observe the map before the entry exists.
    pub async fn register<F>(&self, run_id: &str, spawn: F)
    where
        F: FnOnce(RunCancellationToken) -> JoinHandle<()>,
    {
        let mut tasks = self.inner.lock().await;
        let cancel = RunCancellationToken::new();
        let handle = spawn(cancel.clone());
        tasks.insert(
            run_id.to_string(),
            InFlightTask {
                cancel,
                handle: Some(handle),
            },
        );
    }

    /// Remove a settled task. Called by the background task itself as its
    /// final step.
    pub async fn remove(&self, run_id: &str) {
        self.inner.lock().await.remove(run_id);
    }

    /// Lookup-copy for the cancel path: clone the token and take the join
    /// handle, leaving the entry in place for the task's own finalization.
    pub async fn take_for_cancel(
        &self,
        run_id: &str,
    ) -> Option<(RunCancellationToken, Option<JoinHandle<()>>)> {
        let mut tasks = self.inner.lock().await;
        tasks
            .get_mut(run_id)
            .map(|task| (task.cancel.clone(), task.handle.take()))
    }

    /// Take every remaining completion handle, for teardown.
    pub async fn drain_handles(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = self.inner.lock().await;
        tasks
            .values_mut()
            .filter_map(|task| task.handle.take())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
