//! Task executors
//!
//! An [`Executor`] provides the thread a task runs on. The default
//! [`ThreadExecutor`] spawns one dedicated, named native thread per task.

use std::sync::{Arc, LazyLock};

use super::TaskId;
use crate::config::TaskConfig;

/// A unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs task jobs somewhere other than the calling thread
pub trait Executor: Send + Sync + 'static {
    /// Begin running `job` for `task`
    ///
    /// Returns an error if no thread could be provided; `job` is dropped in
    /// that case.
    fn execute(&self, task: TaskId, job: Job) -> std::io::Result<()>;
}

/// One native thread per task, never reused
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    name_prefix: String,
    stack_size: Option<usize>,
}

impl ThreadExecutor {
    pub fn new(config: &TaskConfig) -> Self {
        Self {
            name_prefix: config.thread_name_prefix.clone(),
            stack_size: config.stack_size,
        }
    }

    /// Thread name used for `task`
    pub fn thread_name(&self, task: TaskId) -> String {
        format!("{}-{}", self.name_prefix, task)
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new(&TaskConfig::default())
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: TaskId, job: Job) -> std::io::Result<()> {
        let mut builder = std::thread::Builder::new().name(self.thread_name(task));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        // Detached: completion is observed through the task, not the handle
        builder.spawn(job).map(drop)
    }
}

static DEFAULT_EXECUTOR: LazyLock<Arc<dyn Executor>> =
    LazyLock::new(|| Arc::new(ThreadExecutor::default()));

/// The shared executor used by [`Task::new`](super::Task::new)
pub fn default_executor() -> Arc<dyn Executor> {
    Arc::clone(&DEFAULT_EXECUTOR)
}
