//! Host, OS and notification collaborators
//!
//! The tunnel runtime never talks to the operating system or the user
//! directly. The host drives it through [`PacketTunnelProvider`]; it reaches
//! out through [`NetworkBoundary`] and [`Notifier`].

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;

use mg_core::config::ProxySettings;
use mg_core::error::TunnelError;
use mg_core::{ActiveSubscriptionRef, StopReason};

use crate::compile::NetworkSettings;

/// Lifecycle hooks invoked by the host tunnel framework
#[async_trait]
pub trait PacketTunnelProvider: Send + Sync {
    /// Start the tunnel for the selected subscription
    async fn start(
        &self,
        active: &ActiveSubscriptionRef,
        settings: &ProxySettings,
    ) -> Result<(), TunnelError>;

    /// Stop the tunnel for an OS-supplied reason
    async fn stop(&self, reason: StopReason);

    /// Answer an app-to-provider message; `None` means no reply
    async fn handle_message(&self, message: &[u8]) -> Option<Vec<u8>>;
}

/// OS-level virtual interface
#[async_trait]
pub trait NetworkBoundary: Send + Sync {
    /// Configure addresses, routes, DNS and MTU of the interface
    async fn apply_network_settings(&self, settings: &NetworkSettings) -> io::Result<()>;

    /// Route interface packets to the core's inbound endpoint
    async fn forward_packets(&self, endpoint: SocketAddr) -> io::Result<()>;
}

/// User-visible notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, body: &str);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, body: &str) {
        tracing::warn!(target: "mango::notify", "{}", body);
    }
}

/// Boundary for hosts without a virtual interface
///
/// Settings are logged and the SOCKS inbound is left for applications to use
/// directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBoundary;

#[async_trait]
impl NetworkBoundary for LocalBoundary {
    async fn apply_network_settings(&self, settings: &NetworkSettings) -> io::Result<()> {
        let document = serde_json::to_string(settings).map_err(io::Error::other)?;
        tracing::debug!("Network settings: {}", document);
        tracing::info!(
            "Tunnel interface: {} mtu {}, ipv6 {}",
            settings.ipv4.address,
            settings.mtu,
            if settings.ipv6.is_some() { "on" } else { "off" }
        );
        Ok(())
    }

    async fn forward_packets(&self, endpoint: SocketAddr) -> io::Result<()> {
        tracing::info!("SOCKS inbound listening on {}", endpoint);
        Ok(())
    }
}
