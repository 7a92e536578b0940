//! Server-side identifier generation.
//!
//! Ids are generated server-side only; clients never supply them.

use uuid::Uuid;

/// Generate a fresh thread id (`thread_` prefix).
pub fn gen_thread_id() -> String {
    format!("thread_{}", Uuid::now_v7().simple())
}

/// Generate a fresh run id (`run_` prefix).
pub fn gen_run_id() -> String {
    format!("run_{}", Uuid::now_v7().simple())
}

/// Generate a fresh message id (`msg_` prefix).
pub fn gen_message_id() -> String {
    format!("msg_{}", Uuid::now_v7().simple())
}

/// Current wall time in whole seconds since the Unix epoch.
pub fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
