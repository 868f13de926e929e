use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Events emitted by the work queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// A new task was accepted
    Enqueued { key: String, pending: usize },

    /// A request joined a task that was already queued or running
    Coalesced { key: String },

    /// A worker picked up the task
    Started { key: String, backend: String },

    /// The task finished with a module status
    Finished {
        key: String,
        status: u16,
        duration_ms: u64,
    },

    /// The backend could not run the task
    DispatchFailed { key: String, failure: FailureContext },
}
