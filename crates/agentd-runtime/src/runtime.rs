//! The bound agent runtime and its default operations.

use agentd_contract::{
    now_unix_secs, CreateRunInput, LastError, RecordStore, Run, RunPatch, RunStatus, Thread,
};
use agentd_store_adapters::FileStore;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapter::{collect, input_to_messages};
use crate::agent::{Agent, RunCancellationToken};
use crate::error::RuntimeError;
use crate::registry::TaskRegistry;

/// Resolve the default file-store root: `$TEGG_AGENT_DATA_DIR`, falling back
/// to `<cwd>/.agent-data`.
pub fn default_data_dir() -> PathBuf {
    std::env::var_os("TEGG_AGENT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::current_dir()
                .map(|dir| dir.join(".agent-data"))
                .unwrap_or_else(|_| PathBuf::from(".agent-data"))
        })
}

/// One-time binding of a user agent to its store and task registry.
pub struct AgentRuntimeBuilder {
    agent: Arc<dyn Agent>,
    store: Option<Arc<dyn RecordStore>>,
}

impl AgentRuntimeBuilder {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent, store: None }
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Resolve the store (explicit override, then the agent's factory, then
    /// the default file store), initialize it, and run the agent's
    /// initializer.
    pub async fn bind(self) -> Result<AgentRuntime, RuntimeError> {
        let store = match self.store.or_else(|| self.agent.store()) {
            Some(store) => store,
            None => Arc::new(FileStore::new(default_data_dir())),
        };
        store.init().await?;
        let runtime = AgentRuntime {
            agent: self.agent,
            store,
            tasks: Arc::new(TaskRegistry::new()),
        };
        runtime.agent.init().await?;
        Ok(runtime)
    }
}

/// A user agent bound to its store and in-flight task registry, exposing
/// the seven default operations.
#[derive(Clone)]
pub struct AgentRuntime {
    pub(crate) agent: Arc<dyn Agent>,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) tasks: Arc<TaskRegistry>,
}

impl AgentRuntime {
    /// Bind an agent with default wiring. See [`AgentRuntimeBuilder`] for
    /// store overrides.
    pub async fn bind(agent: Arc<dyn Agent>) -> Result<Self, RuntimeError> {
        AgentRuntimeBuilder::new(agent).bind().await
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Number of runs currently tracked by the in-flight registry.
    pub async fn in_flight_runs(&self) -> usize {
        self.tasks.len().await
    }

    /// Teardown: await every in-flight task (errors swallowed), destroy the
    /// store, then run the agent's own teardown.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        for handle in self.tasks.drain_handles().await {
            if let Err(err) = handle.await {
                warn!(error = %err, "in-flight run task failed during shutdown");
            }
        }
        if let Err(err) = self.store.destroy().await {
            warn!(error = %err, "store teardown failed");
        }
        self.agent.shutdown().await
    }

    pub async fn create_thread(&self) -> Result<Thread, RuntimeError> {
        Ok(self.store.create_thread(None).await?)
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread, RuntimeError> {
        Ok(self.store.get_thread(thread_id).await?)
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Run, RuntimeError> {
        Ok(self.store.get_run(run_id).await?)
    }

    /// Resolve the target thread (creating one when absent) and allocate a
    /// queued run record. Shared prologue of the three run shapes.
    pub(crate) async fn start_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        let thread_id = match input.thread_id {
            Some(thread_id) => thread_id,
            None => self.store.create_thread(None).await?.id,
        };
        Ok(self
            .store
            .create_run(
                input.input.messages,
                Some(thread_id),
                input.config,
                input.metadata,
            )
            .await?)
    }

    /// Run to completion on the caller's task, returning the terminal run.
    pub async fn sync_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        let run = self.start_run(input).await?;
        match drive_run(&self.store, &self.agent, run, None).await? {
            DriveOutcome::Completed(run) => Ok(run),
            // Unreachable without a cancel token, but keep the type honest.
            DriveOutcome::Aborted(run) => Ok(run),
        }
    }

    /// Accept the run and drain it on a background task. The returned run is
    /// still `queued`; the caller observes progress through `get_run`.
    pub async fn async_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        let run = self.start_run(input).await?;

        let store = self.store.clone();
        let agent = self.agent.clone();
        let tasks = self.tasks.clone();
        let background_run = run.clone();
        let run_id = run.id.clone();
        self.tasks
            .register(&run.id, move |cancel| {
                tokio::spawn(async move {
                    match drive_run(&store, &agent, background_run, Some(cancel)).await {
                        Ok(DriveOutcome::Completed(_)) => {
                            debug!(run_id = %run_id, "background run completed");
                        }
                        Ok(DriveOutcome::Aborted(_)) => {
                            debug!(run_id = %run_id, "background run stopped by cancellation");
                        }
                        Err(err) => {
                            // Already captured into the run record; background
                            // tasks never crash the process.
                            warn!(error = %err, run_id = %run_id, "background run failed");
                        }
                    }
                    tasks.remove(&run_id).await;
                })
            })
            .await;

        Ok(run)
    }

    /// Cancel a live run. Signals the cancel handle, awaits the background
    /// drainer so it cannot race the terminal write, then records
    /// `cancelled`.
    pub async fn cancel_run(&self, run_id: &str) -> Result<Run, RuntimeError> {
        if let Some((cancel, handle)) = self.tasks.take_for_cancel(run_id).await {
            cancel.cancel();
            if let Some(handle) = handle {
                if let Err(err) = handle.await {
                    warn!(error = %err, run_id = %run_id, "run task failed while awaiting cancellation");
                }
            }
        }

        let run = self.store.get_run(run_id).await?;
        if run.status.is_terminal() {
            return Err(RuntimeError::CancelTerminal { status: run.status });
        }
        Ok(self
            .store
            .update_run(
                run_id,
                RunPatch {
                    status: Some(RunStatus::Cancelled),
                    cancelled_at: Some(now_unix_secs()),
                    ..Default::default()
                },
            )
            .await?)
    }
}

pub(crate) enum DriveOutcome {
    Completed(Run),
    /// Cancellation was observed; the terminal write belongs to `cancel_run`.
    Aborted(Run),
}

/// Shared drain-and-finalize protocol of `sync_run` and `async_run`:
/// mark in-progress, drain the generator, then persist the terminal state
/// and append thread history.
pub(crate) async fn drive_run(
    store: &Arc<dyn RecordStore>,
    agent: &Arc<dyn Agent>,
    run: Run,
    cancel: Option<RunCancellationToken>,
) -> Result<DriveOutcome, RuntimeError> {
    let run = store
        .update_run(
            &run.id,
            RunPatch {
                status: Some(RunStatus::InProgress),
                started_at: Some(now_unix_secs()),
                ..Default::default()
            },
        )
        .await?;

    let exec_token = cancel.clone().unwrap_or_default();
    let mut stream = agent.exec_run(run.input.clone(), exec_token);
    let mut chunks = Vec::new();
    let drained: Result<(), crate::error::ExecError> = loop {
        let next = match cancel.as_ref() {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Ok(DriveOutcome::Aborted(run)),
                item = stream.next() => item,
            },
            None => stream.next().await,
        };
        match next {
            None => break Ok(()),
            Some(Ok(chunk)) => chunks.push(chunk),
            Some(Err(err)) => break Err(err),
        }
    };

    let aborted = cancel
        .as_ref()
        .is_some_and(RunCancellationToken::is_cancelled);

    match drained {
        Ok(()) => {
            if aborted {
                return Ok(DriveOutcome::Aborted(run));
            }
            let collected = collect(&chunks, &run.id, run.thread_id.as_deref());
            let updated = store
                .update_run(
                    &run.id,
                    RunPatch {
                        status: Some(RunStatus::Completed),
                        output: Some(collected.output.clone()),
                        usage: collected.usage,
                        completed_at: Some(now_unix_secs()),
                        ..Default::default()
                    },
                )
                .await?;
            if let Some(thread_id) = updated.thread_id.clone() {
                let mut history = input_to_messages(&updated.input, &thread_id, &updated.id);
                history.extend(collected.output);
                store.append_messages(&thread_id, history).await?;
            }
            Ok(DriveOutcome::Completed(updated))
        }
        Err(err) => {
            if aborted {
                return Ok(DriveOutcome::Aborted(run));
            }
            let patch = RunPatch {
                status: Some(RunStatus::Failed),
                last_error: Some(LastError::exec(err.message.clone())),
                failed_at: Some(now_unix_secs()),
                ..Default::default()
            };
            // A store failure here must not mask the generator's error.
            if let Err(store_err) = store.update_run(&run.id, patch).await {
                warn!(error = %store_err, run_id = %run.id, "failed to record run failure");
            }
            Err(RuntimeError::Exec(err))
        }
    }
}
