//! Domain records and storage contract for the agentd runtime.
//!
//! This crate defines the wire-faithful record shapes (threads, messages,
//! runs), the free-form chunk shape produced by user generators, and the
//! [`RecordStore`] seam that durable backends implement.

pub mod chunk;
pub mod ids;
pub mod message;
pub mod run;
pub mod storage;
pub mod thread;

pub use chunk::{ChunkContent, ChunkMessage, ChunkPart, RunChunk, UsageDelta};
pub use ids::{gen_message_id, gen_run_id, gen_thread_id, now_unix_secs};
pub use message::{
    ContentBlock, InputContent, InputMessage, InputPart, InputRole, Message, MessageStatus, Role,
    TextContent,
};
pub use run::{CreateRunInput, LastError, Run, RunConfig, RunInput, RunPatch, RunStatus, RunUsage};
pub use storage::{RecordStore, StoreError};
pub use thread::Thread;
