use thiserror::Error;

/// Why a task submitted to the pool did not produce a result.
///
/// Every call into the pool ends in exactly one `Ok` or one of these.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The worker runtime could not be created; no task was dispatched.
    #[error("failed to create worker '{name}': {reason}")]
    Construction { name: String, reason: String },

    /// No response arrived in time. The worker has been torn down.
    #[error("task {task_id} on worker '{name}' timed out after {timeout_ms}ms")]
    Timeout {
        name: String,
        task_id: String,
        timeout_ms: u64,
    },

    /// The worker did not recognise the task type.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The task's handler failed. The worker stays available.
    #[error("task failed: {0}")]
    Task(String),

    /// The worker's channel closed before it answered.
    #[error("worker '{name}' disconnected")]
    Disconnected { name: String },

    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl PoolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
