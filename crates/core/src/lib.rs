//! taskparallel - Core
//!
//! Thread-backed tasks with continuations, and a dispatcher that marshals
//! callbacks onto a single consumer thread (a UI or frame thread).
//!
//! # Modules
//!
//! - [`tasks`] - [`Task`], typed results, continuations, [`wait_all`]
//! - [`dispatcher`] - the consumer-thread callback queue and its process-wide
//!   access point
//! - [`config`] - TOML runtime configuration
//!
//! # Example
//!
//! ```ignore
//! use taskparallel_core::{initialize_dispatcher, Task};
//!
//! let dispatcher = initialize_dispatcher();
//!
//! let task = Task::run(|| expensive_computation())?;
//! task.continue_on_ui_thread(dispatcher, |t| {
//!     update_ui(t.result().unwrap());
//! });
//!
//! // In the consumer thread's loop
//! dispatcher.drain()?;
//! ```

pub mod config;
pub mod dispatcher;
mod panic;
pub mod tasks;

// Re-export commonly used items
pub use config::{ConfigError, ConfigResult, CoreConfig, DispatcherConfig, TaskConfig};
pub use dispatcher::{
    dispatcher, initialize_dispatcher, initialize_dispatcher_with, run_on_ui_thread,
    CallbackPanic, DispatchError, Dispatcher, DrainReport,
};
pub use tasks::{
    run, wait_all, Awaitable, Executor, ResultTask, Task, TaskError, TaskId, TaskResult,
    TaskStatus, ThreadExecutor,
};
