//! Task handle, lifecycle and continuations
//!
//! A [`Task`] wraps one unit of work that runs on its own thread. Handles
//! are cheap to clone; every clone refers to the same task.
//!
//! Completion is signalled through a mutex and condvar pair. The result,
//! the status change and every side effect of the work happen before the
//! signal, so anything the work did is visible once [`Task::wait`] returns.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::error::{TaskError, TaskResult};
use super::executor::{default_executor, Executor};
use crate::dispatcher::Dispatcher;
use crate::panic;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a task is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Constructed, not started
    Created,
    /// Work handed to the executor
    Running,
    /// Work returned normally
    Completed,
    /// Work panicked, or no thread could be provided
    Failed,
    /// Aborted before completing
    Aborted,
    /// A continuation whose antecedent did not complete; it never ran
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses are never left
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Created | TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Created => "created",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Aborted => "aborted",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

type Work<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Posts a consumer-thread continuation, given the completed task
type UiContinuation<T> = Box<dyn FnOnce(Task<T>) + Send + 'static>;

/// Work started (or cancelled) when its antecedent finishes
///
/// The antecedent is handed over only when firing, so a pending
/// continuation never keeps its antecedent alive.
pub(crate) trait Continuation<T>: Send {
    fn fire(self: Box<Self>, antecedent: Task<T>);
    fn cancel(self: Box<Self>, antecedent: TaskId);
}

/// A continuation task whose work is built from `action` once fired
struct Link<U, F> {
    next: Task<U>,
    action: F,
}

impl<U: Send + 'static, F> Link<U, F> {
    /// Give the continuation its work, ready to start
    fn arm<T>(self, antecedent: Task<T>) -> Task<U>
    where
        T: Send + 'static,
        F: FnOnce(&Task<T>) -> U + Send + 'static,
    {
        let Link { next, action } = self;
        {
            let mut state = next.inner.state.lock();
            // An aborted continuation stays without work
            if state.status == TaskStatus::Created {
                state.work = Some(Box::new(move || action(&antecedent)));
            }
        }
        next
    }

    fn cancel_next(self, antecedent: TaskId) {
        let id = self.next.id();
        let cancelled = self.next.inner.settle(
            TaskStatus::Cancelled,
            TaskError::Cancelled { id, antecedent },
            |s| s == TaskStatus::Created,
        );
        if cancelled {
            tracing::debug!(task = %id, antecedent = %antecedent, "Continuation cancelled");
        }
    }
}

impl<T, U, F> Continuation<T> for Link<U, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(&Task<T>) -> U + Send + 'static,
{
    fn fire(self: Box<Self>, antecedent: Task<T>) {
        let next = self.arm(antecedent);
        if let Err(e) = next.start() {
            tracing::debug!(task = %next.id(), "Continuation not started: {}", e);
        }
    }

    fn cancel(self: Box<Self>, antecedent: TaskId) {
        self.cancel_next(antecedent);
    }
}

pub(super) struct State<T> {
    pub(super) status: TaskStatus,
    pub(super) result: Option<T>,
    failure: Option<TaskError>,
    work: Option<Work<T>>,
    continuation: Option<Box<dyn Continuation<T>>>,
    has_continuation: bool,
    ui_continuations: Vec<UiContinuation<T>>,
}

impl<T> State<T> {
    /// `Ok` once completed, the captured failure once otherwise terminal
    pub(super) fn outcome(&self, id: TaskId) -> TaskResult<()> {
        match self.status {
            TaskStatus::Completed => Ok(()),
            status if status.is_terminal() => {
                Err(self.failure.clone().unwrap_or(TaskError::Aborted { id }))
            }
            status => Err(TaskError::NotCompleted { id, status }),
        }
    }
}

pub(super) struct Inner<T> {
    id: TaskId,
    executor: Arc<dyn Executor>,
    pub(super) state: Mutex<State<T>>,
    finished: Condvar,
}

impl<T: Send + 'static> Inner<T> {
    /// Thread entry point
    fn run(self: Arc<Self>, work: Work<T>) {
        let outcome = panic::capture(work);

        let (continuation, ui_continuations, completed) = {
            let mut state = self.state.lock();
            if state.status != TaskStatus::Running {
                // Aborted while the work was running
                tracing::debug!(task = %self.id, "Discarding outcome of aborted task");
                (None, Vec::new(), false)
            } else {
                match outcome {
                    Ok(value) => {
                        state.result = Some(value);
                        state.status = TaskStatus::Completed;
                        let ui = std::mem::take(&mut state.ui_continuations);
                        (state.continuation.take(), ui, true)
                    }
                    Err(message) => {
                        tracing::error!(task = %self.id, "Task panicked: {}", message);
                        state.status = TaskStatus::Failed;
                        state.failure = Some(TaskError::Panicked {
                            id: self.id,
                            message,
                        });
                        let ui = std::mem::take(&mut state.ui_continuations);
                        (state.continuation.take(), ui, false)
                    }
                }
            }
        };

        self.finished.notify_all();

        if completed {
            tracing::debug!(task = %self.id, "Task completed");
            let task = Task { inner: self };
            for post in ui_continuations {
                post(task.clone());
            }
            if let Some(next) = continuation {
                next.fire(task);
            }
        } else {
            drop(ui_continuations);
            if let Some(next) = continuation {
                next.cancel(self.id);
            }
        }
    }

    /// Move a task that never completed into a failure status
    ///
    /// Un-run work and consumer-thread continuations are dropped and the
    /// continuation is cancelled. Returns `false` if `allowed` rejected the
    /// current status.
    fn settle(
        &self,
        status: TaskStatus,
        failure: TaskError,
        allowed: impl FnOnce(TaskStatus) -> bool,
    ) -> bool {
        let (work, continuation, ui_continuations) = {
            let mut state = self.state.lock();
            if !allowed(state.status) {
                return false;
            }
            state.status = status;
            state.failure = Some(failure);
            (
                state.work.take(),
                state.continuation.take(),
                std::mem::take(&mut state.ui_continuations),
            )
        };

        self.finished.notify_all();
        drop(work);
        drop(ui_continuations);

        if let Some(next) = continuation {
            next.cancel(self.id);
        }
        true
    }
}

/// A handle to one unit of work running on its own thread
///
/// `Task<()>` is a plain task; `Task<T>` also captures the value returned by
/// its work (see [`Task::result`]).
pub struct Task<T = ()> {
    pub(super) inner: Arc<Inner<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Task<T> {
    /// Create a task on the default executor. Nothing runs until
    /// [`start`](Self::start).
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::with_executor(work, default_executor())
    }

    /// Create a task that obtains its thread from `executor`
    pub fn with_executor<F>(work: F, executor: Arc<dyn Executor>) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::from_work(Some(Box::new(work)), executor)
    }

    /// `work` is `None` for a continuation until its antecedent fires it
    fn from_work(work: Option<Work<T>>, executor: Arc<dyn Executor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: TaskId::next(),
                executor,
                state: Mutex::new(State {
                    status: TaskStatus::Created,
                    result: None,
                    failure: None,
                    work,
                    continuation: None,
                    has_continuation: false,
                    ui_continuations: Vec::new(),
                }),
                finished: Condvar::new(),
            }),
        }
    }

    /// Create and start a task
    pub fn run<F>(work: F) -> TaskResult<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let task = Self::new(work);
        task.start()?;
        Ok(task)
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.state.lock().status
    }

    /// Check if the task reached a terminal status
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Begin running the work on a thread from the task's executor
    ///
    /// # Errors
    /// - [`TaskError::InvalidState`] if the task was already started, aborted
    ///   or cancelled, or is a continuation still waiting on its antecedent
    /// - [`TaskError::Spawn`] if no thread could be provided; the task is
    ///   then failed and its continuation cancelled
    pub fn start(&self) -> TaskResult<()> {
        let id = self.id();
        let work = {
            let mut state = self.inner.state.lock();
            let status = state.status;
            if status != TaskStatus::Created {
                return Err(TaskError::InvalidState { id, status });
            }
            let Some(work) = state.work.take() else {
                return Err(TaskError::InvalidState { id, status });
            };
            state.status = TaskStatus::Running;
            work
        };

        tracing::debug!(task = %id, "Starting task");

        let inner = Arc::clone(&self.inner);
        if let Err(e) = self.inner.executor.execute(id, Box::new(move || inner.run(work))) {
            tracing::error!(task = %id, "Failed to start task thread: {}", e);
            let error = TaskError::Spawn {
                id,
                source: Arc::new(e),
            };
            self.inner
                .settle(TaskStatus::Failed, error.clone(), |s| s == TaskStatus::Running);
            return Err(error);
        }

        Ok(())
    }

    /// Abort the task.
    ///
    /// Threads are never killed. The task is marked aborted, waiters are
    /// released at once, and its thread is detached: the work keeps running
    /// to its end, but its result is discarded and its continuations never
    /// run (the continuation task becomes [`TaskStatus::Cancelled`]).
    /// Resources held by the work are released only when it returns.
    ///
    /// No-op on a finished task.
    pub fn abort(&self) {
        let id = self.id();
        let aborted = self
            .inner
            .settle(TaskStatus::Aborted, TaskError::Aborted { id }, |s| {
                !s.is_terminal()
            });

        if aborted {
            tracing::warn!(task = %id, "Task aborted, detaching its thread");
        } else {
            tracing::trace!(task = %id, "Abort ignored, task already finished");
        }
    }

    /// Block until the task finishes
    ///
    /// Any number of threads may wait on the same task.
    ///
    /// # Returns
    /// `Ok(())` if the work returned normally, otherwise the reason it did
    /// not ([`TaskError::Panicked`], [`TaskError::Spawn`],
    /// [`TaskError::Aborted`] or [`TaskError::Cancelled`])
    pub fn wait(&self) -> TaskResult<()> {
        let mut state = self.inner.state.lock();
        while !state.status.is_terminal() {
            self.inner.finished.wait(&mut state);
        }
        state.outcome(self.inner.id)
    }

    /// Attach a continuation that runs `action(self)` once this task's work
    /// returns normally
    ///
    /// The returned task is started automatically; starting it yourself
    /// fails with [`TaskError::InvalidState`]. If this task already completed
    /// it starts right away. If this task fails or is aborted the
    /// continuation never runs and finishes as [`TaskStatus::Cancelled`].
    ///
    /// Until it fires, the continuation holds no handle to this task, so an
    /// unstarted chain is freed once every handle to it is dropped.
    ///
    /// # Errors
    /// [`TaskError::ContinuationAlreadySet`] if a continuation was attached
    /// before.
    pub fn continue_with<U, F>(&self, action: F) -> TaskResult<Task<U>>
    where
        U: Send + 'static,
        F: FnOnce(&Task<T>) -> U + Send + 'static,
    {
        let continuation = Task::from_work(None, Arc::clone(&self.inner.executor));
        let mut link = Some(Link {
            next: continuation.clone(),
            action,
        });

        let status = {
            let mut state = self.inner.state.lock();
            if state.has_continuation {
                return Err(TaskError::ContinuationAlreadySet { id: self.id() });
            }
            state.has_continuation = true;

            let status = state.status;
            if !status.is_terminal() {
                if let Some(link) = link.take() {
                    state.continuation = Some(Box::new(link));
                }
            }
            status
        };

        tracing::debug!(
            task = %self.id(),
            continuation = %continuation.id(),
            "Continuation attached"
        );

        // Still set only when this task had already finished
        if let Some(link) = link {
            if status == TaskStatus::Completed {
                link.arm(self.clone()).start()?;
            } else {
                link.cancel_next(self.id());
            }
        }

        Ok(continuation)
    }

    /// Run `action(self)` on the dispatcher's consumer thread once this task
    /// completes
    ///
    /// Unlike posting at attach time, nothing is queued until the work
    /// returns normally: the callback is posted at completion (right away if
    /// the task already completed) and runs at the consumer's next drain, so
    /// the result is always populated. A drain before completion does not run
    /// it, and nothing is ever queued if the task fails or is aborted.
    pub fn continue_on_ui_thread<F>(&self, dispatcher: &Dispatcher, action: F)
    where
        F: FnOnce(&Task<T>) + Send + 'static,
    {
        let dispatcher = dispatcher.clone();
        let post: UiContinuation<T> = Box::new(move |task: Task<T>| {
            let id = task.id();
            if let Err(e) = dispatcher.post_blocking(move || action(&task)) {
                tracing::error!(task = %id, "Failed to queue consumer thread continuation: {}", e);
            }
        });

        let status = {
            let mut state = self.inner.state.lock();
            let status = state.status;
            if !status.is_terminal() {
                state.ui_continuations.push(post);
                return;
            }
            status
        };

        if status == TaskStatus::Completed {
            post(self.clone());
        } else {
            tracing::debug!(
                task = %self.id(),
                "Task {}, consumer thread continuation dropped",
                status
            );
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Task");
        out.field("id", &self.inner.id);
        // Formatting from inside `with_result` must not deadlock
        match self.inner.state.try_lock() {
            Some(state) => out.field("status", &state.status),
            None => out.field("status", &format_args!("<locked>")),
        };
        out.finish()
    }
}
