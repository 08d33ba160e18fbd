//! Consumer thread frame loop
//!
//! Drives a [`Dispatcher`] from its consumer thread: every frame drains the
//! queued callbacks, then runs the registered per-frame callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use taskparallel_core::{DispatchError, Dispatcher, DrainReport};

use crate::config::FrameConfig;

new_key_type! {
    /// Key for registered frame callbacks
    pub struct FrameKey;
}

/// Callback type for frame listeners, called with the frame number
pub type FrameCallback = Box<dyn Fn(u64) + Send + Sync>;

/// Frame driver for one consumer thread
///
/// Must be ticked on the dispatcher's consumer thread.
pub struct FrameLoop {
    dispatcher: Dispatcher,
    config: FrameConfig,
    callbacks: RwLock<SlotMap<FrameKey, FrameCallback>>,
    frame_count: AtomicU64,
    last_frame_time_ns: AtomicU64,
}

impl FrameLoop {
    pub fn new(dispatcher: Dispatcher, config: FrameConfig) -> Self {
        Self {
            dispatcher,
            config,
            callbacks: RwLock::new(SlotMap::with_key()),
            frame_count: AtomicU64::new(0),
            last_frame_time_ns: AtomicU64::new(0),
        }
    }

    /// The dispatcher drained by this loop
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Register a callback to be called every frame
    ///
    /// Must not be called from inside a frame callback; post the
    /// registration to the dispatcher instead.
    ///
    /// # Returns
    /// A key that can be used to unregister the callback
    pub fn register_frame_callback<F>(&self, callback: F) -> FrameKey
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.callbacks.write().insert(Box::new(callback))
    }

    /// Unregister a frame callback
    ///
    /// # Returns
    /// `true` if the callback was found and removed
    pub fn unregister_frame_callback(&self, key: FrameKey) -> bool {
        self.callbacks.write().remove(key).is_some()
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Get the last frame processing time in nanoseconds
    pub fn last_frame_time_ns(&self) -> u64 {
        self.last_frame_time_ns.load(Ordering::Relaxed)
    }

    /// Run one frame
    pub fn tick(&self) -> Result<DrainReport, DispatchError> {
        let start = Instant::now();

        // Process callbacks queued from other threads
        let report = self.dispatcher.drain()?;
        let frame = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
        if report.executed > 0 {
            tracing::trace!("Processed {} queued callbacks", report.executed);
        }

        // Fire registered callbacks
        {
            let callbacks = self.callbacks.read();
            for (_, callback) in callbacks.iter() {
                callback(frame);
            }
        }

        // Record frame time for monitoring
        let elapsed = start.elapsed().as_nanos() as u64;
        self.last_frame_time_ns.store(elapsed, Ordering::Relaxed);

        if elapsed > self.config.slow_frame_warn_ms.saturating_mul(1_000_000) {
            tracing::warn!("Frame took {}ms (frame {})", elapsed / 1_000_000, frame);
        }

        Ok(report)
    }

    /// Tick at the configured interval until `done` returns true
    ///
    /// Stops early once `max_frames` frames have run.
    ///
    /// # Returns
    /// The number of frames run
    pub fn run_until<F>(&self, mut done: F) -> Result<u64, DispatchError>
    where
        F: FnMut() -> bool,
    {
        let interval = Duration::from_millis(self.config.interval_ms);
        let mut frames = 0;

        while !done() {
            if self.config.max_frames.is_some_and(|max| frames >= max) {
                tracing::warn!("Stopping after {} frames without finishing", frames);
                break;
            }

            let start = Instant::now();
            self.tick()?;
            frames += 1;

            if let Some(rest) = interval.checked_sub(start.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        Ok(frames)
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("frame_count", &self.frame_count())
            .field("callbacks", &self.callbacks.read().len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use taskparallel_core::{DispatcherConfig, Task};

    fn frame_loop(config: FrameConfig) -> FrameLoop {
        FrameLoop::new(Dispatcher::new(&DispatcherConfig::default()), config)
    }

    #[test]
    fn test_tick_drains_then_runs_callbacks() {
        let frames = frame_loop(FrameConfig::default());
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        {
            let log = log.clone();
            frames.register_frame_callback(move |frame| log.lock().push(format!("frame {}", frame)));
        }
        {
            let log = log.clone();
            frames
                .dispatcher()
                .post(move || log.lock().push("queued".to_string()))
                .unwrap();
        }

        let report = frames.tick().unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(frames.frame_count(), 1);
        assert_eq!(*log.lock(), vec!["queued".to_string(), "frame 1".to_string()]);
    }

    #[test]
    fn test_unregister_frame_callback() {
        let frames = frame_loop(FrameConfig::default());
        let count = Arc::new(AtomicU64::new(0));

        let key = {
            let count = count.clone();
            frames.register_frame_callback(move |_| {
                count.fetch_add(1, Ordering::Relaxed);
            })
        };

        frames.tick().unwrap();
        assert!(frames.unregister_frame_callback(key));
        assert!(!frames.unregister_frame_callback(key));
        frames.tick().unwrap();

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(frames.frame_count(), 2);
    }

    #[test]
    fn test_run_until_task_result_reaches_consumer() {
        let frames = frame_loop(FrameConfig {
            interval_ms: 1,
            max_frames: Some(5_000),
            ..FrameConfig::default()
        });
        let done = Arc::new(AtomicBool::new(false));

        let task = Task::run(|| 6 * 7).unwrap();
        {
            let done = done.clone();
            let consumer = std::thread::current().id();
            task.continue_on_ui_thread(frames.dispatcher(), move |t| {
                assert_eq!(std::thread::current().id(), consumer);
                assert_eq!(t.result().unwrap(), 42);
                done.store(true, Ordering::SeqCst);
            });
        }

        let ran = frames.run_until(|| done.load(Ordering::SeqCst)).unwrap();
        assert!(ran >= 1);
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_until_respects_max_frames() {
        let frames = frame_loop(FrameConfig {
            interval_ms: 0,
            slow_frame_warn_ms: 5,
            max_frames: Some(3),
        });

        assert_eq!(frames.run_until(|| false).unwrap(), 3);
        assert_eq!(frames.frame_count(), 3);
    }

    #[test]
    fn test_tick_off_consumer_thread_fails() {
        let frames = Arc::new(frame_loop(FrameConfig::default()));
        let remote = frames.clone();

        let result = std::thread::spawn(move || remote.tick()).join().unwrap();
        assert!(matches!(result, Err(DispatchError::NotConsumerThread { .. })));
        assert_eq!(frames.frame_count(), 0);

        frames.tick().unwrap();
        assert_eq!(frames.frame_count(), 1);
    }
}
