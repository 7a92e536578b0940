//! Assistants-style HTTP surface for the agentd runtime.

pub mod http;
pub mod sse;
