//! Thread-backed tasks with continuations
//!
//! Each [`Task`] runs its work on a dedicated thread. A task can hand off to
//! a continuation task when it completes, or post a callback to the
//! consumer thread through a [`Dispatcher`](crate::dispatcher::Dispatcher).
//!
//! # Example
//!
//! ```ignore
//! use taskparallel_core::tasks::{wait_all, Awaitable, Task};
//!
//! let fetch = Task::run(|| 2)?;
//! let scaled = fetch.continue_with(|t| t.result().unwrap() * 10)?;
//! scaled.continue_on_ui_thread(&dispatcher, |t| {
//!     tracing::info!("result: {}", t.result().unwrap());
//! });
//!
//! wait_all([&fetch as &dyn Awaitable, &scaled])?;
//! ```

pub mod error;
pub mod executor;
pub mod result;
pub mod task;

pub use error::{TaskError, TaskResult};
pub use executor::{default_executor, Executor, Job, ThreadExecutor};
pub use result::ResultTask;
pub use task::{Task, TaskId, TaskStatus};

/// Anything that can be blocked on until it finishes
pub trait Awaitable {
    fn wait(&self) -> TaskResult<()>;
}

impl<T: Send + 'static> Awaitable for Task<T> {
    fn wait(&self) -> TaskResult<()> {
        Task::wait(self)
    }
}

impl<A: Awaitable + ?Sized> Awaitable for &A {
    fn wait(&self) -> TaskResult<()> {
        (**self).wait()
    }
}

/// Create and start a task
pub fn run<T, F>(work: F) -> TaskResult<Task<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Task::run(work)
}

/// Block until every task has finished
///
/// Every task is waited on, even after one of them fails, so when this
/// returns none of them is still running.
///
/// # Returns
/// `Ok(())` if all completed, otherwise the first error in iteration order
pub fn wait_all<I>(tasks: I) -> TaskResult<()>
where
    I: IntoIterator,
    I::Item: Awaitable,
{
    let mut first_error = None;
    for task in tasks {
        if let Err(e) = task.wait() {
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_all_out_of_order_completion() {
        let finished = Arc::new(Mutex::new(Vec::new()));

        let tasks: Vec<Task> = [30_u64, 5, 15]
            .into_iter()
            .enumerate()
            .map(|(index, delay)| {
                let finished = finished.clone();
                run(move || {
                    thread::sleep(Duration::from_millis(delay));
                    finished.lock().push(index);
                })
                .unwrap()
            })
            .collect();

        wait_all(&tasks).unwrap();

        assert!(tasks.iter().all(Task::is_finished));
        let mut order = finished.lock().clone();
        assert_eq!(order.len(), 3);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_wait_all_keeps_waiting_after_failure() {
        let failing = run(|| -> () { panic!("first task failed") }).unwrap();
        let slow = run(|| thread::sleep(Duration::from_millis(50))).unwrap();

        let err = wait_all([&failing, &slow]).unwrap_err();

        assert!(matches!(err, TaskError::Panicked { id, .. } if id == failing.id()));
        // A short-circuiting wait would have returned before `slow` finished
        assert_eq!(slow.status(), TaskStatus::Completed);
    }

    #[test]
    fn test_wait_all_mixed_result_types() {
        let unit = run(|| {}).unwrap();
        let number = run(|| 3_u8).unwrap();
        let text = run(|| "three".to_string()).unwrap();

        wait_all([&unit as &dyn Awaitable, &number, &text]).unwrap();

        assert_eq!(number.result().unwrap(), 3);
        assert_eq!(text.result().unwrap(), "three");
    }

    #[test]
    fn test_wait_all_empty() {
        assert!(wait_all(Vec::<Task>::new()).is_ok());
    }
}
