//! Run command implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use mg_core::{ActiveSubscriptionRef, StopReason};
use mg_tunnel::boundary::{LocalBoundary, Notifier, PacketTunnelProvider};
use mg_tunnel::TunnelRuntime;

use super::{resolve_subscription, CliContext};
use crate::output::{print_info, print_success, print_warning};

/// Shows tunnel notifications on the terminal
///
/// Start failures are returned to `main` and printed there, so nothing is
/// shown until the tunnel is up.
#[derive(Default)]
struct ConsoleNotifier {
    running: AtomicBool,
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, body: &str) {
        if self.running.load(Ordering::SeqCst) {
            print_warning(body);
        } else {
            tracing::debug!("Notification before startup: {}", body);
        }
    }
}

/// Start the tunnel and keep it running until Ctrl+C
pub async fn run_command(ctx: &CliContext, subscription: Option<&str>) -> Result<()> {
    let settings = ctx.load_settings()?;
    let notifier = Arc::new(ConsoleNotifier::default());
    let runtime = TunnelRuntime::new(
        ctx.config.clone(),
        Arc::new(LocalBoundary),
        notifier.clone(),
    )
    .await
    .context("Failed to initialize the tunnel runtime")?;

    let active = match subscription {
        Some(query) => {
            let target = resolve_subscription(runtime.subscription_store(), query)?;
            ActiveSubscriptionRef::from(&target.id)
        }
        None => ctx.load_selection()?.current,
    };

    let tunnel = Arc::clone(runtime.tunnel());
    if let Err(e) = tunnel.start(&active, &settings).await {
        runtime.shutdown().await;
        return Err(e.into());
    }
    notifier.running.store(true, Ordering::SeqCst);

    let status = tunnel.status();
    if let Some(endpoint) = status.endpoint {
        print_success(&format!("Tunnel running, SOCKS inbound on {}", endpoint));
    }
    print_info("Press Ctrl+C to stop");

    let signal = tokio::signal::ctrl_c().await;
    if let Err(e) = &signal {
        print_warning(&format!("Failed to listen for Ctrl+C: {}", e));
    }

    tunnel.stop(StopReason::UserInitiated).await;
    runtime.shutdown().await;
    signal.context("Signal handling failed")
}
