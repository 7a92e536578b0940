//! The agentd runtime core.
//!
//! A user supplies one generator ([`Agent::exec_run`], a lazy producer of
//! streamed chunks); the runtime composes the seven Assistants-style
//! operations around it: thread creation and retrieval, synchronous,
//! background, and SSE-streaming runs, run retrieval, and cooperative
//! cancellation. Durable state lives behind the
//! [`agentd_contract::RecordStore`] seam.

pub mod adapter;
pub mod agent;
pub mod api;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod stream;

pub use adapter::{collect, input_to_messages, to_content_blocks, ChunkCollector, CollectedRun};
pub use agent::{Agent, ChunkStream, RunCancellationToken};
pub use api::AgentApi;
pub use error::{ExecError, RuntimeError};
pub use registry::TaskRegistry;
pub use runtime::{default_data_dir, AgentRuntime, AgentRuntimeBuilder};
pub use stream::{
    FrameStream, StreamFrame, EVENT_DONE, EVENT_MESSAGE_COMPLETED, EVENT_MESSAGE_CREATED,
    EVENT_MESSAGE_DELTA, EVENT_RUN_COMPLETED, EVENT_RUN_CREATED, EVENT_RUN_FAILED,
    EVENT_RUN_IN_PROGRESS,
};
