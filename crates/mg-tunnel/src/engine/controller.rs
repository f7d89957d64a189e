//! Core process controller

use std::sync::Arc;

use tokio::sync::Mutex;

use mg_core::error::CoreError;

use super::{LogSink, ProxyCore};
use crate::compile::CompiledConfig;

/// Starts and stops the proxy core; at most one run at a time
pub struct CoreController {
    core: Arc<dyn ProxyCore>,
    logs: LogSink,
    /// Held across start/stop so the two never interleave
    running: Mutex<bool>,
}

impl CoreController {
    /// Create a controller that routes core logs into `logs`
    pub fn new(core: Arc<dyn ProxyCore>, logs: LogSink) -> Self {
        Self {
            core,
            logs,
            running: Mutex::new(false),
        }
    }

    /// Start the core; returns once it confirmed startup or failed
    pub async fn start(&self, config: &CompiledConfig) -> Result<(), CoreError> {
        let mut running = self.running.lock().await;
        if *running {
            return Err(CoreError::new("core is already running"));
        }

        tracing::info!(
            "Starting core with {:?} on {}:{}",
            config.config_path,
            config.inbound.listen,
            config.inbound.port
        );

        self.logs.set_accepting(true);
        match self.core.start(config, self.logs.clone()).await {
            Ok(()) => {
                *running = true;
                tracing::info!("Core started");
                Ok(())
            }
            Err(e) => {
                self.logs.set_accepting(false);
                // A failed start may leave a half-initialized core behind
                self.core.stop().await;
                tracing::error!("Core failed to start: {}", e);
                Err(e)
            }
        }
    }

    /// Stop the core; a no-op when it is not running
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if !*running {
            return;
        }

        self.core.stop().await;
        self.logs.set_accepting(false);
        *running = false;

        let dropped = self.logs.dropped();
        if dropped > 0 {
            tracing::warn!("Dropped {} core log messages (channel full)", dropped);
        }
        tracing::info!("Core stopped");
    }

    /// Whether a run is active
    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }
}
