//! Typed results
//!
//! The value returned by a task's work is stored before completion is
//! signalled, and can only be read once the task has completed.

use super::error::{TaskError, TaskResult};
use super::task::{Task, TaskStatus};

/// A task whose work produces a `T`
pub type ResultTask<T> = Task<T>;

impl<T: Send + 'static> Task<T> {
    /// Borrow the result
    ///
    /// `f` runs with the task's state locked. Calling `status`, `wait`,
    /// `result`, `abort` or `continue_with` on this task from inside `f`
    /// deadlocks; `{:?}` is safe and shows the status as `<locked>`. Use
    /// [`result`](Self::result) to work on a copy without holding the lock.
    ///
    /// # Errors
    /// [`TaskError::NotCompleted`] before completion, or the task's failure
    /// if it did not complete.
    pub fn with_result<R>(&self, f: impl FnOnce(&T) -> R) -> TaskResult<R> {
        let id = self.id();
        let state = self.inner.state.lock();
        state.outcome(id)?;

        match state.result.as_ref() {
            Some(value) => Ok(f(value)),
            None => Err(TaskError::NotCompleted {
                id,
                status: TaskStatus::Completed,
            }),
        }
    }

    /// Clone the result out of a completed task
    pub fn result(&self) -> TaskResult<T>
    where
        T: Clone,
    {
        self.with_result(T::clone)
    }

    /// Wait for the task, then clone its result
    pub fn wait_result(&self) -> TaskResult<T>
    where
        T: Clone,
    {
        self.wait()?;
        self.result()
    }
}
