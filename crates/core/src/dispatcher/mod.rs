//! Consumer thread dispatcher
//!
//! Background threads hand callbacks to the consumer thread (UI thread,
//! game frame thread) through a [`Dispatcher`]. The consumer drains it once
//! per iteration of its own loop.
//!
//! A [`Dispatcher`] can be created and passed around explicitly, or the
//! process-wide one can be created with [`initialize_dispatcher`] and used
//! through [`run_on_ui_thread`].
//!
//! # Example
//!
//! ```ignore
//! use taskparallel_core::dispatcher::{initialize_dispatcher, run_on_ui_thread};
//!
//! // On the consumer thread, at startup
//! let dispatcher = initialize_dispatcher();
//!
//! // From any thread
//! run_on_ui_thread(|| tracing::info!("hello from the consumer thread"))?;
//!
//! // Once per frame, on the consumer thread
//! dispatcher.drain()?;
//! ```

pub mod queue;

use std::sync::OnceLock;
use std::thread::ThreadId;

use crate::config::DispatcherConfig;

pub use queue::{Callback, CallbackPanic, Dispatcher, DispatcherStats, DrainReport, PanicSink};

/// Dispatcher errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The process-wide dispatcher has not been created yet
    #[error("Dispatcher not initialized")]
    NotInitialized,

    /// A bounded queue is at capacity
    #[error("Dispatcher queue full")]
    QueueFull,

    /// The queue's receiving side is gone
    #[error("Dispatcher queue closed")]
    Closed,

    /// `drain` was called from a thread other than the consumer
    #[error("Drain called from {caller:?}, but the consumer thread is {consumer:?}")]
    NotConsumerThread { consumer: ThreadId, caller: ThreadId },
}

/// Process-wide dispatcher
static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

/// Create the process-wide dispatcher if it does not exist yet
///
/// Call from the consumer thread: the first caller becomes the consumer.
/// Later calls are no-ops returning the existing dispatcher.
pub fn initialize_dispatcher() -> &'static Dispatcher {
    initialize_dispatcher_with(&DispatcherConfig::default())
}

/// Like [`initialize_dispatcher`], using `config` if this call creates it
pub fn initialize_dispatcher_with(config: &DispatcherConfig) -> &'static Dispatcher {
    let mut created = false;
    let dispatcher = DISPATCHER.get_or_init(|| {
        created = true;
        Dispatcher::new(config)
    });

    if created {
        tracing::info!(
            "Dispatcher initialized, consumer thread {:?}",
            dispatcher.consumer_thread()
        );
    } else {
        tracing::trace!("Dispatcher already initialized");
    }

    dispatcher
}

/// Get the process-wide dispatcher, if initialized
pub fn dispatcher() -> Option<&'static Dispatcher> {
    DISPATCHER.get()
}

/// Queue a callback on the process-wide dispatcher
///
/// This is safe to call from any thread.
pub fn run_on_ui_thread<F>(callback: F) -> Result<(), DispatchError>
where
    F: FnOnce() + Send + 'static,
{
    dispatcher()
        .ok_or(DispatchError::NotInitialized)?
        .post(callback)
}
