//! Work-queue error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum QueueError {
    #[error("queue is shut down")]
    Closed,

    #[error("task {key} was dropped before completing")]
    TaskDropped { key: String },

    #[error("dispatch to {url} failed: {message}")]
    DispatchFailed { url: String, message: String },

    #[error("invalid task: {message}")]
    InvalidTask { message: String },
}

impl UserFacingError for QueueError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::DispatchFailed { .. } | Self::TaskDropped { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Closed => "queue.closed",
            Self::TaskDropped { .. } => "queue.task_dropped",
            Self::DispatchFailed { .. } => "queue.dispatch_failed",
            Self::InvalidTask { .. } => "queue.invalid_task",
        };
        Some(code)
    }
}
