//! taskparallel demo host
//!
//! Runs background tasks with continuations while the main thread acts as
//! the consumer thread, draining the dispatcher once per frame.
//!
//! Usage: `taskparallel-demo [host.toml]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskparallel_core::{
    initialize_dispatcher_with, run_on_ui_thread, wait_all, Awaitable, Executor, Task,
    TaskStatus, ThreadExecutor,
};
use taskparallel_host::{init_logging, FrameLoop, HostConfig};

fn main() -> ExitCode {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| HostConfig::default_path().ok());

    let (config, load_error) = match path.as_deref().map(HostConfig::load) {
        Some(Ok(config)) => (config, None),
        Some(Err(e)) => (HostConfig::default(), Some(e)),
        None => (HostConfig::default(), None),
    };

    init_logging(config.effective_log_filter());
    if let Some(e) = load_error {
        tracing::warn!("Using default config: {}", e);
    }

    // The main thread is the consumer thread
    let dispatcher = initialize_dispatcher_with(&config.core.dispatcher);
    let executor: Arc<dyn Executor> = Arc::new(ThreadExecutor::new(&config.core.tasks));
    let frames = FrameLoop::new(dispatcher.clone(), config.frame.clone());

    frames.register_frame_callback(|frame| {
        if frame % 30 == 0 {
            tracing::debug!("Frame {}", frame);
        }
    });

    let sum = Task::with_executor(
        || {
            std::thread::sleep(Duration::from_millis(200));
            (1..=100_u64).sum::<u64>()
        },
        executor.clone(),
    );

    let message = match sum.continue_with(|t| match t.result() {
        Ok(total) => format!("Sum of 1..=100 is {}", total),
        Err(e) => format!("Sum unavailable: {}", e),
    }) {
        Ok(task) => task,
        Err(e) => {
            tracing::error!("Failed to chain continuation: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let done = Arc::new(AtomicBool::new(false));
    {
        let done = done.clone();
        message.continue_on_ui_thread(dispatcher, move |t| {
            match t.result() {
                Ok(text) => tracing::info!("{}", text),
                Err(e) => tracing::error!("Continuation failed: {}", e),
            }
            done.store(true, Ordering::SeqCst);
        });
    }

    let ping = Task::with_executor(
        || {
            if let Err(e) = run_on_ui_thread(|| tracing::info!("Posted from a background task")) {
                tracing::error!("Failed to post to consumer thread: {}", e);
            }
        },
        executor,
    );

    if let Err(e) = sum.start().and_then(|()| ping.start()) {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }

    // The consumer continuation never runs if the chain fails
    let chain_failed = || message.is_finished() && message.status() != TaskStatus::Completed;
    match frames.run_until(|| done.load(Ordering::SeqCst) || chain_failed()) {
        Ok(count) => tracing::info!("Consumer thread ran {} frames", count),
        Err(e) => {
            tracing::error!("Frame loop stopped: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = wait_all([&sum as &dyn Awaitable, &message, &ping]) {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }

    // Drain anything still queued, e.g. the background post
    if let Err(e) = frames.tick() {
        tracing::error!("Final frame failed: {}", e);
    }

    let stats = dispatcher.stats();
    tracing::info!(
        "Done: {} callbacks executed, {} panicked",
        stats.executed,
        stats.panicked
    );
    ExitCode::SUCCESS
}
