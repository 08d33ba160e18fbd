//! Consumer thread callback queue
//!
//! Allows any thread to queue work that executes on the consumer thread.
//! The consumer drains the queue once per iteration of its own loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use super::DispatchError;
use crate::config::DispatcherConfig;
use crate::panic;

/// A callback to execute on the consumer thread
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Receives every callback panic caught during a drain
pub type PanicSink = Box<dyn Fn(&CallbackPanic) + Send + Sync + 'static>;

/// A panic caught while running a queued callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPanic {
    /// Zero-based position of the callback within its drain
    pub position: usize,
    /// Panic message
    pub message: String,
}

/// Outcome of a single drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Callbacks run, including those that panicked
    pub executed: usize,
    /// Callbacks that panicked
    pub panicked: usize,
}

/// Lifetime counters for a dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub executed: u64,
    pub panicked: u64,
}

struct Inner {
    sender: Sender<Callback>,
    receiver: Receiver<Callback>,
    consumer: ThreadId,
    max_per_drain: Option<usize>,
    executed: AtomicU64,
    panicked: AtomicU64,
    panic_sink: RwLock<Option<PanicSink>>,
}

/// Thread-safe FIFO of callbacks drained by a single consumer thread.
///
/// The thread that creates the dispatcher becomes its consumer thread.
/// Handles are cheap to clone and may be moved to any thread for posting.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher whose consumer is the current thread
    ///
    /// A zero `capacity` or `max_callbacks_per_drain` is raised to 1: a
    /// zero-capacity channel is a rendezvous that `drain` can never receive
    /// from, and a zero cap would never run anything.
    pub fn new(config: &DispatcherConfig) -> Self {
        let (sender, receiver) = match config.capacity {
            Some(0) => {
                tracing::warn!("Dispatcher capacity 0 is not usable, using 1");
                bounded(1)
            }
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };

        let max_per_drain = config.max_callbacks_per_drain.map(|max| {
            if max == 0 {
                tracing::warn!("max_callbacks_per_drain 0 is not usable, using 1");
            }
            max.max(1)
        });

        Self {
            inner: Arc::new(Inner {
                sender,
                receiver,
                consumer: std::thread::current().id(),
                max_per_drain,
                executed: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
                panic_sink: RwLock::new(None),
            }),
        }
    }

    /// Queue a callback for the next drain
    ///
    /// This is safe to call from any thread.
    ///
    /// # Returns
    /// - `Ok(())` if the callback was queued
    /// - `Err(DispatchError::QueueFull)` if a bounded queue is at capacity
    ///   (the callback is dropped)
    #[tracing::instrument(skip_all)]
    pub fn post<F>(&self, callback: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner.sender.try_send(Box::new(callback)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Dispatcher queue full, dropping callback");
                Err(DispatchError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("Dispatcher queue disconnected");
                Err(DispatchError::Closed)
            }
        }
    }

    /// Queue a callback, blocking while a bounded queue is full
    ///
    /// On the consumer thread this behaves like [`post`](Self::post), since
    /// waiting for a drain that only this thread can perform would deadlock.
    #[tracing::instrument(skip_all)]
    pub fn post_blocking<F>(&self, callback: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_consumer_thread() {
            return self.post(callback);
        }

        self.inner.sender.send(Box::new(callback)).map_err(|e| {
            tracing::error!("Failed to queue callback (blocking): {}", e);
            DispatchError::Closed
        })
    }

    /// Run the callbacks queued before this call, in FIFO order
    ///
    /// Must be called from the consumer thread. Callbacks queued while the
    /// drain is running are left for the next drain. A panicking callback is
    /// reported and the drain moves on to the next one.
    #[tracing::instrument(skip(self))]
    pub fn drain(&self) -> Result<DrainReport, DispatchError> {
        let caller = std::thread::current().id();
        if caller != self.inner.consumer {
            return Err(DispatchError::NotConsumerThread {
                consumer: self.inner.consumer,
                caller,
            });
        }

        let backlog = self.inner.receiver.len();
        let budget = match self.inner.max_per_drain {
            Some(max) => backlog.min(max),
            None => backlog,
        };

        let mut report = DrainReport::default();
        for position in 0..budget {
            let Ok(callback) = self.inner.receiver.try_recv() else {
                break;
            };

            report.executed += 1;
            if let Err(message) = panic::capture(callback) {
                report.panicked += 1;
                self.report_panic(CallbackPanic { position, message });
            }
        }

        self.inner
            .executed
            .fetch_add(report.executed as u64, Ordering::Relaxed);
        self.inner
            .panicked
            .fetch_add(report.panicked as u64, Ordering::Relaxed);

        if budget < backlog {
            tracing::trace!("Deferred {} callbacks to the next drain", backlog - budget);
        }

        Ok(report)
    }

    fn report_panic(&self, panic: CallbackPanic) {
        tracing::error!(
            position = panic.position,
            "Queued callback panicked: {}",
            panic.message
        );

        if let Some(sink) = self.inner.panic_sink.read().as_ref() {
            if let Err(message) = panic::capture(|| sink(&panic)) {
                tracing::error!(position = panic.position, "Panic sink panicked: {}", message);
            }
        }
    }

    /// Install the function that receives callback panics, replacing any
    /// previous one
    pub fn set_panic_sink<F>(&self, sink: F)
    where
        F: Fn(&CallbackPanic) + Send + Sync + 'static,
    {
        *self.inner.panic_sink.write() = Some(Box::new(sink));
    }

    /// Number of callbacks currently queued
    pub fn pending(&self) -> usize {
        self.inner.receiver.len()
    }

    /// The thread allowed to drain this dispatcher
    pub fn consumer_thread(&self) -> ThreadId {
        self.inner.consumer
    }

    /// Check if the current thread is the consumer thread
    pub fn is_consumer_thread(&self) -> bool {
        std::thread::current().id() == self.inner.consumer
    }

    /// Callbacks executed and panicked over the dispatcher's lifetime
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            executed: self.inner.executed.load(Ordering::Relaxed),
            panicked: self.inner.panicked.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("consumer", &self.inner.consumer)
            .field("pending", &self.pending())
            .field("max_per_drain", &self.inner.max_per_drain)
            .finish()
    }
}
