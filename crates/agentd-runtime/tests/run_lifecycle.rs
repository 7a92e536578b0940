use agentd_contract::{
    CreateRunInput, InputMessage, MessageStatus, Role, RunChunk, RunStatus,
};
use agentd_runtime::{
    Agent, AgentRuntime, AgentRuntimeBuilder, ChunkStream, ExecError, RunCancellationToken,
    RuntimeError, EVENT_DONE, EVENT_MESSAGE_COMPLETED, EVENT_MESSAGE_CREATED, EVENT_MESSAGE_DELTA,
    EVENT_RUN_COMPLETED, EVENT_RUN_CREATED, EVENT_RUN_FAILED, EVENT_RUN_IN_PROGRESS,
};
use agentd_store_adapters::MemoryStore;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Yields a fixed chunk script on every invocation.
struct ScriptedAgent {
    chunks: Vec<Result<RunChunk, ExecError>>,
}

impl ScriptedAgent {
    fn completing() -> Self {
        Self {
            chunks: vec![
                Ok(RunChunk::assistant_text("Processed 1 messages")),
                Ok(RunChunk::usage(10, 5)),
            ],
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            chunks: vec![
                Ok(RunChunk::assistant_text("partial")),
                Err(ExecError::new(message)),
            ],
        }
    }
}

impl Agent for ScriptedAgent {
    fn exec_run(&self, _input: Vec<InputMessage>, _cancel: RunCancellationToken) -> ChunkStream {
        let chunks = self.chunks.clone();
        Box::pin(async_stream::stream! {
            for chunk in chunks {
                yield chunk;
            }
        })
    }
}

/// Yields one chunk, then parks on a long cancel-aware delay before the
/// final chunk.
struct SlowAgent {
    delay: Duration,
}

impl Agent for SlowAgent {
    fn exec_run(&self, _input: Vec<InputMessage>, cancel: RunCancellationToken) -> ChunkStream {
        let delay = self.delay;
        Box::pin(async_stream::stream! {
            yield Ok(RunChunk::assistant_text("first"));
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            yield Ok(RunChunk::assistant_text("second"));
        })
    }
}

async fn bind(agent: impl Agent) -> AgentRuntime {
    AgentRuntimeBuilder::new(Arc::new(agent))
        .with_store(Arc::new(MemoryStore::new()))
        .bind()
        .await
        .expect("bind should succeed")
}

fn one_user_message() -> CreateRunInput {
    CreateRunInput::from_messages(vec![InputMessage::user("Hi")])
}

async fn wait_for_status(
    runtime: &AgentRuntime,
    run_id: &str,
    status: RunStatus,
) -> agentd_contract::Run {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        let run = runtime.get_run(run_id).await.expect("run should exist");
        if run.status == status {
            return run;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "run {run_id} never reached {status}, stuck at {}",
            run.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn sync_run_completes_and_appends_history() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let run = runtime.sync_run(one_user_message()).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.id.starts_with("run_"));
    assert!(run.started_at.is_some());
    assert!(run.completed_at.is_some());
    assert!(run.created_at <= run.started_at.unwrap());

    let usage = run.usage.unwrap();
    assert_eq!(usage.total_tokens, 15);

    let output = run.output.as_deref().unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].status, MessageStatus::Completed);

    let thread_id = run.thread_id.as_deref().unwrap();
    assert!(thread_id.starts_with("thread_"));
    let thread = runtime.get_thread(thread_id).await.unwrap();
    assert_eq!(thread.messages.len(), 2);
    assert_eq!(thread.messages[0].role, Role::User);
    assert_eq!(thread.messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn sync_run_drops_system_messages_from_history() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let input = CreateRunInput::from_messages(vec![
        InputMessage::system("be terse"),
        InputMessage::user("Hi"),
    ]);
    let run = runtime.sync_run(input).await.unwrap();

    let thread = runtime
        .get_thread(run.thread_id.as_deref().unwrap())
        .await
        .unwrap();
    // system input dropped; one user message plus one output message remain
    assert_eq!(thread.messages.len(), 2);
    assert!(thread.messages.iter().all(|m| m.role != Role::Assistant
        || m.run_id.as_deref() == Some(run.id.as_str())));
}

#[tokio::test]
async fn sync_run_reuses_an_explicit_thread() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let thread = runtime.create_thread().await.unwrap();
    let mut input = one_user_message();
    input.thread_id = Some(thread.id.clone());

    let run = runtime.sync_run(input).await.unwrap();
    assert_eq!(run.thread_id.as_deref(), Some(thread.id.as_str()));
    let thread = runtime.get_thread(&thread.id).await.unwrap();
    assert_eq!(thread.messages.len(), 2);
}

#[tokio::test]
async fn sync_run_failure_reraises_without_history() {
    let runtime = bind(ScriptedAgent::failing("generator exploded")).await;

    // Pre-create the thread so the run id is recoverable from its record.
    let thread = runtime.create_thread().await.unwrap();
    let mut input = one_user_message();
    input.thread_id = Some(thread.id.clone());

    let err = runtime.sync_run(input).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Exec(_)));
    assert_eq!(err.to_string(), "generator exploded");

    // The thread got no history on the failure path.
    let thread = runtime.get_thread(&thread.id).await.unwrap();
    assert!(thread.messages.is_empty());
}

#[tokio::test]
async fn async_run_returns_queued_then_completes() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let run = runtime.async_run(one_user_message()).await.unwrap();
    assert_eq!(run.status, RunStatus::Queued);
    assert!(run.thread_id.is_some());

    let finished = wait_for_status(&runtime, &run.id, RunStatus::Completed).await;
    assert_eq!(finished.usage.unwrap().total_tokens, 15);
    assert_eq!(finished.output.as_deref().unwrap().len(), 1);

    // Registry entry is removed by the background finalizer.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while runtime.in_flight_runs().await != 0 {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn async_run_failure_is_stored_not_raised() {
    let runtime = bind(ScriptedAgent::failing("background boom")).await;

    let run = runtime.async_run(one_user_message()).await.unwrap();
    let failed = wait_for_status(&runtime, &run.id, RunStatus::Failed).await;

    let last_error = failed.last_error.unwrap();
    assert_eq!(last_error.code, "EXEC_ERROR");
    assert_eq!(last_error.message, "background boom");
    assert!(failed.failed_at.is_some());
}

#[tokio::test]
async fn cancel_while_running_wins_the_terminal_write() {
    let runtime = bind(SlowAgent {
        delay: Duration::from_secs(5),
    })
    .await;

    let run = runtime.async_run(one_user_message()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cancelled = runtime.cancel_run(&run.id).await.unwrap();
    assert_eq!(cancelled.status, RunStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert!(cancelled.completed_at.is_none());
    // The generator's final chunk never became output.
    assert!(cancelled.output.is_none());

    let reloaded = runtime.get_run(&run.id).await.unwrap();
    assert_eq!(reloaded.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_a_terminal_run_is_an_illegal_state() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let run = runtime.sync_run(one_user_message()).await.unwrap();
    let err = runtime.cancel_run(&run.id).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::CancelTerminal {
            status: RunStatus::Completed
        }
    ));
    assert_eq!(
        err.to_string(),
        "Cannot cancel run with status 'completed'"
    );

    // Terminal status is sticky.
    let reloaded = runtime.get_run(&run.id).await.unwrap();
    assert_eq!(reloaded.status, RunStatus::Completed);
}

#[tokio::test]
async fn unknown_records_surface_not_found() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let err = runtime.get_thread("thread_nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Thread thread_nope not found");

    let err = runtime.get_run("run_nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Run run_nope not found");
}

#[tokio::test]
async fn run_metadata_and_config_are_persisted() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let mut input = one_user_message();
    let mut metadata = serde_json::Map::new();
    metadata.insert("user_id".to_string(), serde_json::json!("u1"));
    input.metadata = Some(metadata.clone());
    input.config = Some(agentd_contract::RunConfig {
        max_iterations: Some(3),
        timeout_ms: Some(30_000),
    });

    let run = runtime.sync_run(input).await.unwrap();
    assert_eq!(run.metadata.as_ref(), Some(&metadata));
    assert_eq!(run.config.unwrap().timeout_ms, Some(30_000));

    let reloaded = runtime.get_run(&run.id).await.unwrap();
    assert_eq!(reloaded.metadata.as_ref(), Some(&metadata));
}

#[tokio::test]
async fn stream_run_emits_the_documented_frame_sequence() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let mut frames = runtime.stream_run(one_user_message()).await.unwrap();
    let mut names = Vec::new();
    let mut collected = Vec::new();
    while let Some(frame) = frames.next().await {
        names.push(frame.name());
        collected.push(frame);
    }

    assert_eq!(
        names,
        vec![
            EVENT_RUN_CREATED,
            EVENT_RUN_IN_PROGRESS,
            EVENT_MESSAGE_CREATED,
            EVENT_MESSAGE_DELTA,
            EVENT_MESSAGE_COMPLETED,
            EVENT_RUN_COMPLETED,
            EVENT_DONE,
        ]
    );

    let agentd_runtime::StreamFrame::Event { data, .. } = &collected[3] else {
        panic!("delta frame should carry data");
    };
    assert_eq!(data["object"], "thread.message.delta");
    assert_eq!(
        data["delta"]["content"][0]["text"]["value"],
        "Processed 1 messages"
    );

    let agentd_runtime::StreamFrame::Event { data, .. } = &collected[5] else {
        panic!("run.completed frame should carry data");
    };
    assert_eq!(data["status"], "completed");
    assert_eq!(data["usage"]["total_tokens"], 15);
    assert_eq!(data["output"][0]["content"][0]["text"]["value"], "Processed 1 messages");
}

#[tokio::test]
async fn stream_run_failure_replaces_terminals_with_failed_then_done() {
    let runtime = bind(ScriptedAgent::failing("stream boom")).await;

    let mut frames = runtime.stream_run(one_user_message()).await.unwrap();
    let mut names = Vec::new();
    let mut last_event_data = None;
    while let Some(frame) = frames.next().await {
        names.push(frame.name());
        if let agentd_runtime::StreamFrame::Event { name, data } = frame {
            if name == EVENT_RUN_FAILED {
                last_event_data = Some(data);
            }
        }
    }

    assert_eq!(
        names,
        vec![
            EVENT_RUN_CREATED,
            EVENT_RUN_IN_PROGRESS,
            EVENT_MESSAGE_CREATED,
            EVENT_MESSAGE_DELTA,
            EVENT_RUN_FAILED,
            EVENT_DONE,
        ]
    );

    let data = last_event_data.expect("failed frame should carry the run");
    assert_eq!(data["status"], "failed");
    assert_eq!(data["last_error"]["code"], "EXEC_ERROR");
    assert_eq!(data["last_error"]["message"], "stream boom");
}

#[tokio::test]
async fn stream_run_persists_the_terminal_state() {
    let runtime = bind(ScriptedAgent::completing()).await;

    let mut frames = runtime.stream_run(one_user_message()).await.unwrap();
    let mut run_id = None;
    while let Some(frame) = frames.next().await {
        if let agentd_runtime::StreamFrame::Event { name, data } = &frame {
            if *name == EVENT_RUN_CREATED {
                run_id = data["id"].as_str().map(str::to_string);
            }
        }
    }

    let run_id = run_id.expect("created frame should carry the run id");
    let run = runtime.get_run(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let thread = runtime
        .get_thread(run.thread_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(thread.messages.len(), 2);
}

#[tokio::test]
async fn dropping_the_frame_stream_cancels_the_generator() {
    let runtime = bind(SlowAgent {
        delay: Duration::from_secs(5),
    })
    .await;

    let mut frames = runtime.stream_run(one_user_message()).await.unwrap();
    // Read up to the first delta, then hang up.
    let mut run_id = None;
    while let Some(frame) = frames.next().await {
        if let agentd_runtime::StreamFrame::Event { name, data } = &frame {
            if *name == EVENT_RUN_CREATED {
                run_id = data["id"].as_str().map(str::to_string);
            }
            if *name == EVENT_MESSAGE_DELTA {
                break;
            }
        }
    }
    drop(frames);

    // The drainer observes the closed channel on its next send and stops
    // without a terminal write.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let run = runtime.get_run(run_id.as_deref().unwrap()).await.unwrap();
    assert_eq!(run.status, RunStatus::InProgress);
}

#[tokio::test]
async fn shutdown_awaits_in_flight_runs() {
    let runtime = bind(SlowAgent {
        delay: Duration::from_millis(100),
    })
    .await;

    let run = runtime.async_run(one_user_message()).await.unwrap();
    runtime.shutdown().await.unwrap();

    // Shutdown returned only after the drainer settled.
    let finished = runtime.get_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Completed);
    assert_eq!(finished.output.as_deref().unwrap().len(), 2);
}
