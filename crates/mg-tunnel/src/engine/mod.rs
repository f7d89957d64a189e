//! Proxy core boundary
//!
//! The core is an opaque, fallible engine behind [`ProxyCore`]. Its log
//! callbacks arrive on core-owned tasks at any time and are handed to the
//! observability sink through a bounded, non-blocking [`LogSink`].

mod controller;
mod logs;
mod process;

pub use controller::CoreController;
pub use logs::{log_channel, spawn_log_forwarder, CoreLog, LogReceiver, LogSink};
pub use process::{classify_line, ProcessCore};

use async_trait::async_trait;

use mg_core::error::CoreError;

use crate::compile::CompiledConfig;

/// A proxy engine that can be started with a compiled configuration
#[async_trait]
pub trait ProxyCore: Send + Sync {
    /// Load the configuration and begin serving on the inbound endpoint.
    ///
    /// Returns once the core has confirmed startup or reported failure.
    async fn start(&self, config: &CompiledConfig, logs: LogSink) -> Result<(), CoreError>;

    /// Halt the core. Must be a no-op when it is not running.
    async fn stop(&self);
}
