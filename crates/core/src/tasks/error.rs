//! Error types for task operations

use std::sync::Arc;

use super::{TaskId, TaskStatus};

/// Result type for task operations
pub type TaskResult<T> = Result<T, TaskError>;

/// Error type for task operations
///
/// Cloneable so a captured failure can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// `start` was called on a task that is not freshly created
    #[error("Task {id} cannot start: already {status}")]
    InvalidState { id: TaskId, status: TaskStatus },

    /// The task already has a continuation attached
    #[error("Task {id} already has a continuation")]
    ContinuationAlreadySet { id: TaskId },

    /// The work panicked
    #[error("Task {id} panicked: {message}")]
    Panicked { id: TaskId, message: String },

    /// The executor could not provide a thread
    #[error("Task {id} could not be started: {source}")]
    Spawn {
        id: TaskId,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The task was aborted before it completed
    #[error("Task {id} was aborted")]
    Aborted { id: TaskId },

    /// The continuation never ran because its antecedent did not complete
    #[error("Task {id} was cancelled: antecedent task {antecedent} did not complete")]
    Cancelled { id: TaskId, antecedent: TaskId },

    /// The result was read before the task completed
    #[error("Task {id} has no result yet: {status}")]
    NotCompleted { id: TaskId, status: TaskStatus },
}

impl TaskError {
    /// The task this error belongs to
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskError::InvalidState { id, .. }
            | TaskError::ContinuationAlreadySet { id }
            | TaskError::Panicked { id, .. }
            | TaskError::Spawn { id, .. }
            | TaskError::Aborted { id }
            | TaskError::Cancelled { id, .. }
            | TaskError::NotCompleted { id, .. } => *id,
        }
    }
}
