//! taskparallel - Host
//!
//! Reference consumer-thread driver for `taskparallel-core`: a frame loop
//! that drains the dispatcher once per frame, plus logging bootstrap and
//! host configuration.

pub mod config;
pub mod frame;

use tracing_subscriber::EnvFilter;

pub use config::{FrameConfig, HostConfig};
pub use frame::{FrameCallback, FrameKey, FrameLoop};

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` overrides `default_filter`. Does nothing if a subscriber is
/// already installed.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
