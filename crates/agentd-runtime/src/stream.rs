//! The SSE event-sequence protocol for streaming runs.
//!
//! The per-chunk logic is inlined here rather than delegated to
//! [`crate::adapter::collect`] so tokens reach the wire as they are
//! produced, with state persisted alongside.

use agentd_contract::{
    now_unix_secs, ContentBlock, CreateRunInput, LastError, Message, MessageStatus, RecordStore,
    Role, Run, RunPatch, RunStatus, RunUsage,
};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::adapter::{input_to_messages, to_content_blocks};
use crate::agent::{Agent, RunCancellationToken};
use crate::error::RuntimeError;
use crate::runtime::AgentRuntime;

pub const EVENT_RUN_CREATED: &str = "thread.run.created";
pub const EVENT_RUN_IN_PROGRESS: &str = "thread.run.in_progress";
pub const EVENT_RUN_COMPLETED: &str = "thread.run.completed";
pub const EVENT_RUN_FAILED: &str = "thread.run.failed";
pub const EVENT_MESSAGE_CREATED: &str = "thread.message.created";
pub const EVENT_MESSAGE_DELTA: &str = "thread.message.delta";
pub const EVENT_MESSAGE_COMPLETED: &str = "thread.message.completed";
pub const EVENT_DONE: &str = "done";

/// One SSE frame. `Done` is the terminal `data: [DONE]` frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Event { name: &'static str, data: Value },
    Done,
}

impl StreamFrame {
    pub fn name(&self) -> &'static str {
        match self {
            StreamFrame::Event { name, .. } => name,
            StreamFrame::Done => EVENT_DONE,
        }
    }
}

/// The ordered frame sequence of one streaming run.
pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

fn run_frame(name: &'static str, run: &Run) -> StreamFrame {
    StreamFrame::Event {
        name,
        data: serde_json::to_value(run).unwrap_or(Value::Null),
    }
}

fn message_frame(name: &'static str, message: &Message) -> StreamFrame {
    StreamFrame::Event {
        name,
        data: serde_json::to_value(message).unwrap_or(Value::Null),
    }
}

fn delta_frame(message_id: &str, blocks: &[ContentBlock]) -> StreamFrame {
    StreamFrame::Event {
        name: EVENT_MESSAGE_DELTA,
        data: json!({
            "id": message_id,
            "object": "thread.message.delta",
            "delta": { "content": blocks },
        }),
    }
}

/// Frame writer over the response channel. A failed send means the client
/// went away: the run token is cancelled and later frames are dropped while
/// the drainer unwinds.
struct FrameSink {
    tx: mpsc::Sender<StreamFrame>,
    cancel: RunCancellationToken,
    closed: bool,
}

impl FrameSink {
    async fn send(&mut self, frame: StreamFrame) {
        if self.closed {
            return;
        }
        if self.tx.send(frame).await.is_err() {
            self.closed = true;
            self.cancel.cancel();
        }
    }

    /// Resolves when the client hangs up (the receiving stream is dropped).
    async fn closed(&self) {
        self.tx.closed().await;
    }
}

impl AgentRuntime {
    /// Start a run and return its SSE frame sequence. Frames are produced by
    /// a spawned drainer; dropping the returned stream cancels the run
    /// cooperatively.
    pub async fn stream_run(&self, input: CreateRunInput) -> Result<FrameStream, RuntimeError> {
        let run = self.start_run(input).await?;
        let (tx, mut rx) = mpsc::channel::<StreamFrame>(64);
        let store = self.store.clone();
        let agent = self.agent.clone();

        tokio::spawn(async move {
            drive_stream(store, agent, run, tx).await;
        });

        Ok(Box::pin(async_stream::stream! {
            while let Some(frame) = rx.recv().await {
                yield frame;
            }
        }))
    }
}

async fn drive_stream(
    store: Arc<dyn RecordStore>,
    agent: Arc<dyn Agent>,
    mut run: Run,
    tx: mpsc::Sender<StreamFrame>,
) {
    let cancel = RunCancellationToken::new();
    let mut sink = FrameSink {
        tx,
        cancel: cancel.clone(),
        closed: false,
    };

    if let Err(err) = stream_events(&store, &agent, &mut run, &mut sink, &cancel).await {
        let last_error = match &err {
            RuntimeError::Store(store_err) => LastError {
                code: "STORE_ERROR".to_string(),
                message: store_err.to_string(),
            },
            other => LastError::exec(other.to_string()),
        };
        let failed_at = now_unix_secs();
        let patch = RunPatch {
            status: Some(RunStatus::Failed),
            last_error: Some(last_error.clone()),
            failed_at: Some(failed_at),
            ..Default::default()
        };
        // Cleanup store failures are logged, never allowed to mask the
        // original error.
        match store.update_run(&run.id, patch).await {
            Ok(updated) => run = updated,
            Err(store_err) => {
                warn!(error = %store_err, run_id = %run.id, "failed to record stream run failure");
                run.status = RunStatus::Failed;
                run.last_error = Some(last_error);
                run.failed_at = Some(failed_at);
            }
        }
        sink.send(run_frame(EVENT_RUN_FAILED, &run)).await;
    }

    // Guaranteed-release step: the terminal frame goes out on every path.
    sink.send(StreamFrame::Done).await;
}

/// The event-sequence success path. Returns early without a terminal write
/// when cancellation is observed between chunks; propagates generator and
/// store errors to the caller's failure path.
async fn stream_events(
    store: &Arc<dyn RecordStore>,
    agent: &Arc<dyn Agent>,
    run: &mut Run,
    sink: &mut FrameSink,
    cancel: &RunCancellationToken,
) -> Result<(), RuntimeError> {
    sink.send(run_frame(EVENT_RUN_CREATED, run)).await;

    *run = store
        .update_run(
            &run.id,
            RunPatch {
                status: Some(RunStatus::InProgress),
                started_at: Some(now_unix_secs()),
                ..Default::default()
            },
        )
        .await?;
    sink.send(run_frame(EVENT_RUN_IN_PROGRESS, run)).await;

    let mut message = Message::new(Role::Assistant, MessageStatus::InProgress, Vec::new())
        .with_run_id(run.id.clone());
    message.thread_id = run.thread_id.clone();
    sink.send(message_frame(EVENT_MESSAGE_CREATED, &message))
        .await;

    let mut prompt_tokens = 0u64;
    let mut completion_tokens = 0u64;
    let mut has_usage = false;

    let mut stream = agent.exec_run(run.input.clone(), cancel.clone());
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            // Close-listener: a hung-up client aborts the run token.
            _ = sink.closed() => {
                cancel.cancel();
                return Ok(());
            }
            item = stream.next() => item,
        };
        let Some(item) = next else {
            break;
        };
        let chunk = item?;
        if let Some(chunk_message) = chunk.message.as_ref() {
            let blocks = to_content_blocks(Some(chunk_message));
            sink.send(delta_frame(&message.id, &blocks)).await;
            message.content.extend(blocks);
        }
        if let Some(usage) = chunk.usage {
            prompt_tokens += usage.prompt_tokens;
            completion_tokens += usage.completion_tokens;
            has_usage = true;
        }
    }

    message.status = MessageStatus::Completed;
    sink.send(message_frame(EVENT_MESSAGE_COMPLETED, &message))
        .await;

    let usage = has_usage.then(|| RunUsage::new(prompt_tokens, completion_tokens));
    let output = if message.content.is_empty() {
        Vec::new()
    } else {
        vec![message.clone()]
    };
    *run = store
        .update_run(
            &run.id,
            RunPatch {
                status: Some(RunStatus::Completed),
                output: Some(output.clone()),
                usage,
                completed_at: Some(now_unix_secs()),
                ..Default::default()
            },
        )
        .await?;
    sink.send(run_frame(EVENT_RUN_COMPLETED, run)).await;

    if let Some(thread_id) = run.thread_id.clone() {
        let mut history = input_to_messages(&run.input, &thread_id, &run.id);
        history.extend(output);
        // The run already completed on the wire; a history failure only logs.
        if let Err(err) = store.append_messages(&thread_id, history).await {
            warn!(error = %err, thread_id = %thread_id, "failed to append stream run history");
        }
    }
    Ok(())
}
