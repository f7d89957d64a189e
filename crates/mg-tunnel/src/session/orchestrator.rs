//! Tunnel session orchestrator
//!
//! Start ordering: resolve the selected subscription, apply OS network
//! settings, lease a port, compile, start the core, then point packet
//! forwarding at the inbound endpoint. Any failure after resolution ends the
//! session in `Stopped(CoreStartFailure)`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{watch, Mutex};

use mg_core::config::{ProxySettings, TunnelConfig};
use mg_core::error::TunnelError;
use mg_core::{ActiveSubscriptionRef, StopReason, Subscription};

use super::{StopCause, TunnelSession, TunnelState, TunnelStatus};
use crate::boundary::{NetworkBoundary, Notifier, PacketTunnelProvider};
use crate::compile::{compile, network_settings};
use crate::engine::CoreController;
use crate::port::PortAllocator;
use crate::store::SubscriptionStore;

/// Drives one tunnel session at a time
pub struct TunnelOrchestrator {
    store: Arc<SubscriptionStore>,
    controller: Arc<CoreController>,
    ports: PortAllocator,
    boundary: Arc<dyn NetworkBoundary>,
    notifier: Arc<dyn Notifier>,
    tunnel: TunnelConfig,
    state: watch::Sender<TunnelState>,
    /// Held for the whole of a start or stop
    session: Mutex<Option<TunnelSession>>,
}

#[derive(Debug, Deserialize)]
struct HostMessage {
    #[serde(rename = "type")]
    kind: String,
}

impl TunnelOrchestrator {
    pub fn new(
        store: Arc<SubscriptionStore>,
        controller: Arc<CoreController>,
        boundary: Arc<dyn NetworkBoundary>,
        notifier: Arc<dyn Notifier>,
        tunnel: TunnelConfig,
    ) -> Self {
        let (state, _) = watch::channel(TunnelState::Idle);
        Self {
            store,
            controller,
            ports: PortAllocator::new(),
            boundary,
            notifier,
            tunnel,
            state,
            session: Mutex::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TunnelState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<TunnelState> {
        self.state.subscribe()
    }

    /// Snapshot of the current session
    ///
    /// Session details are omitted while a start or stop is in progress.
    pub fn status(&self) -> TunnelStatus {
        let state = self.state();
        let guard = self.session.try_lock().ok();
        let session = guard.as_deref().and_then(Option::as_ref);
        TunnelStatus {
            state,
            subscription: session.map(|s| s.subscription_id.clone()),
            endpoint: session.and_then(TunnelSession::endpoint),
            last_error: session.and_then(|s| s.last_error.clone()),
        }
    }

    /// Look up the selected subscription and its cached payload
    async fn resolve(
        &self,
        active: &ActiveSubscriptionRef,
    ) -> Result<(Subscription, PathBuf), TunnelError> {
        let id = active.id().ok_or_else(|| {
            TunnelError::MisconfiguredActiveSubscription("no subscription selected".into())
        })?;
        let subscription = self.store.get(&id).ok_or_else(|| {
            TunnelError::MisconfiguredActiveSubscription(format!("subscription {} does not exist", id))
        })?;
        let payload_path = self.store.payload_path(&id).ok_or_else(|| {
            TunnelError::MisconfiguredActiveSubscription(format!("subscription {} does not exist", id))
        })?;
        if tokio::fs::metadata(&payload_path).await.is_err() {
            return Err(TunnelError::MisconfiguredActiveSubscription(format!(
                "cached payload {:?} is missing",
                payload_path
            )));
        }
        Ok((subscription, payload_path))
    }

    async fn bring_up(
        &self,
        session: &mut TunnelSession,
        subscription: &Subscription,
        payload_path: PathBuf,
        settings: &ProxySettings,
    ) -> Result<(), TunnelError> {
        let network = network_settings(&settings.network, &self.tunnel);
        self.boundary
            .apply_network_settings(&network)
            .await
            .map_err(|e| TunnelError::NetworkSettings(e.to_string()))?;

        let lease = self.ports.allocate(self.tunnel.listen_address)?;
        let endpoint = lease.addr();
        session.lease = Some(lease);

        let compiled = compile(settings, payload_path, subscription.format, endpoint);
        self.controller.start(&compiled).await?;

        if let Err(e) = self.boundary.forward_packets(endpoint).await {
            self.controller.stop().await;
            return Err(TunnelError::Forwarding(e.to_string()));
        }
        Ok(())
    }
}

/// OS settings failures are reported to the caller only
fn notifies(error: &TunnelError) -> bool {
    !matches!(error, TunnelError::NetworkSettings(_))
}

#[async_trait]
impl PacketTunnelProvider for TunnelOrchestrator {
    async fn start(
        &self,
        active: &ActiveSubscriptionRef,
        settings: &ProxySettings,
    ) -> Result<(), TunnelError> {
        if self.state().is_active() {
            return Err(TunnelError::AlreadyActive);
        }

        // State only changes under the session lock
        let mut session = self.session.lock().await;
        let began = self.state.send_if_modified(|state| {
            if state.is_active() {
                return false;
            }
            *state = TunnelState::Starting;
            true
        });
        if !began {
            return Err(TunnelError::AlreadyActive);
        }

        let (subscription, payload_path) = match self.resolve(active).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!("Cannot start tunnel: {}", e);
                *session = None;
                self.state.send_replace(TunnelState::Idle);
                return Err(e);
            }
        };

        tracing::info!(
            "Starting tunnel for {} ({})",
            subscription.alias,
            subscription.id
        );
        let current = session.insert(TunnelSession::new(subscription.id.clone()));

        match self
            .bring_up(current, &subscription, payload_path, settings)
            .await
        {
            Ok(()) => {
                self.state.send_replace(TunnelState::Running);
                tracing::info!(
                    "Tunnel running on {}",
                    current
                        .endpoint()
                        .map(|e| e.to_string())
                        .unwrap_or_default()
                );
                Ok(())
            }
            Err(e) => {
                current.lease = None;
                current.last_error = Some(e.to_string());
                self.state
                    .send_replace(TunnelState::Stopped(StopCause::CoreStartFailure));
                tracing::error!("Tunnel start failed: {}", e);
                if notifies(&e) {
                    self.notifier.send(&e.to_string()).await;
                }
                Err(e)
            }
        }
    }

    async fn stop(&self, reason: StopReason) {
        // A start in progress holds the lock until it settles
        let mut session = self.session.lock().await;
        if self.state() == TunnelState::Running {
            self.state.send_replace(TunnelState::Stopping);
            tracing::info!("Stopping tunnel: {}", reason);
        }

        self.controller.stop().await;
        if let Some(ended) = session.take() {
            tracing::debug!("Session for {} ended", ended.subscription_id);
        }
        self.state
            .send_replace(TunnelState::Stopped(StopCause::Requested(reason)));

        match reason.message() {
            Some(message) => self.notifier.send(message).await,
            None => tracing::warn!("Tunnel stopped with unrecognized reason {}", reason),
        }
    }

    async fn handle_message(&self, message: &[u8]) -> Option<Vec<u8>> {
        let request: HostMessage = match serde_json::from_slice(message) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("Ignoring malformed host message: {}", e);
                return None;
            }
        };

        match request.kind.as_str() {
            "status" => serde_json::to_vec(&self.status()).ok(),
            other => {
                tracing::debug!("Ignoring host message of type {:?}", other);
                None
            }
        }
    }
}
