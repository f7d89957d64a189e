//! Tunnel runtime state

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mg_core::config::AppConfig;
use mg_core::error::{MgError, StoreError};

use crate::boundary::{NetworkBoundary, Notifier};
use crate::engine::{log_channel, spawn_log_forwarder, CoreController, ProcessCore, ProxyCore};
use crate::session::TunnelOrchestrator;
use crate::store::{Fetcher, HttpFetcher, SubscriptionStore};

/// Everything needed to manage subscriptions and run the tunnel
pub struct TunnelRuntime {
    /// Configuration
    pub config: AppConfig,
    /// Subscription store
    pub store: Arc<SubscriptionStore>,
    /// Session orchestrator
    pub orchestrator: Arc<TunnelOrchestrator>,
    cancel: CancellationToken,
    log_forwarder: JoinHandle<()>,
}

impl TunnelRuntime {
    /// Create the runtime with the HTTP fetcher and the external core binary
    pub async fn new(
        config: AppConfig,
        boundary: Arc<dyn NetworkBoundary>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MgError> {
        let fetcher = HttpFetcher::new(&config.fetch).map_err(StoreError::from)?;
        let core = ProcessCore::new(&config.core, config.run_dir());
        Self::with_parts(config, Arc::new(fetcher), Arc::new(core), boundary, notifier).await
    }

    /// Create the runtime with explicit collaborators
    pub async fn with_parts(
        config: AppConfig,
        fetcher: Arc<dyn Fetcher>,
        core: Arc<dyn ProxyCore>,
        boundary: Arc<dyn NetworkBoundary>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MgError> {
        let store = Arc::new(SubscriptionStore::open(config.subscriptions_dir(), fetcher).await?);

        let (sink, logs) = log_channel(config.log_channel_capacity);
        let cancel = CancellationToken::new();
        let log_forwarder = spawn_log_forwarder(logs, cancel.clone());

        let controller = Arc::new(CoreController::new(core, sink));
        let orchestrator = Arc::new(TunnelOrchestrator::new(
            Arc::clone(&store),
            controller,
            boundary,
            notifier,
            config.tunnel.clone(),
        ));

        Ok(Self {
            config,
            store,
            orchestrator,
            cancel,
            log_forwarder,
        })
    }

    /// Get the subscription store
    pub fn subscription_store(&self) -> &Arc<SubscriptionStore> {
        &self.store
    }

    /// Get the orchestrator
    pub fn tunnel(&self) -> &Arc<TunnelOrchestrator> {
        &self.orchestrator
    }

    /// Stop the log forwarder and wait for it to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.log_forwarder.await {
            tracing::warn!("Log forwarder ended abnormally: {}", e);
        }
    }
}
