//! End-to-end tunnel lifecycle tests
//!
//! download -> select -> start -> stop against a fake core and OS boundary.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use url::Url;

use mg_core::config::{AppConfig, ProxySettings, SelectionState, SniffingPolicy};
use mg_core::error::{CoreError, FetchError, TunnelError};
use mg_core::time::current_time_millis;
use mg_core::{ActiveSubscriptionRef, StopReason};
use mg_tunnel::boundary::{NetworkBoundary, Notifier, PacketTunnelProvider};
use mg_tunnel::compile::{CompiledConfig, NetworkSettings};
use mg_tunnel::engine::{LogSink, ProxyCore};
use mg_tunnel::session::StopCause;
use mg_tunnel::store::Fetcher;
use mg_tunnel::{TunnelRuntime, TunnelState};

struct FakeFetcher;

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, _source: &Url) -> Result<Bytes, FetchError> {
        Ok(Bytes::from_static(br#"{"outbounds":[{"protocol":"freedom"}]}"#))
    }
}

/// Records every configuration it was started with
#[derive(Default)]
struct RecordingCore {
    started: Mutex<Vec<CompiledConfig>>,
    stops: Mutex<usize>,
}

#[async_trait]
impl ProxyCore for RecordingCore {
    async fn start(&self, config: &CompiledConfig, logs: LogSink) -> Result<(), CoreError> {
        logs.access("from 127.0.0.1:50000 accepted tcp:example.com:443");
        self.started.lock().unwrap().push(config.clone());
        Ok(())
    }

    async fn stop(&self) {
        *self.stops.lock().unwrap() += 1;
    }
}

#[derive(Default)]
struct FakeBoundary {
    settings: Mutex<Vec<NetworkSettings>>,
    forwarded: Mutex<Vec<SocketAddr>>,
}

#[async_trait]
impl NetworkBoundary for FakeBoundary {
    async fn apply_network_settings(&self, settings: &NetworkSettings) -> io::Result<()> {
        self.settings.lock().unwrap().push(settings.clone());
        Ok(())
    }

    async fn forward_packets(&self, endpoint: SocketAddr) -> io::Result<()> {
        self.forwarded.lock().unwrap().push(endpoint);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, body: &str) {
        self.sent.lock().unwrap().push(body.to_string());
    }
}

struct TestEnv {
    dir: TempDir,
    runtime: TunnelRuntime,
    core: Arc<RecordingCore>,
    boundary: Arc<FakeBoundary>,
    notifier: Arc<RecordingNotifier>,
}

async fn setup() -> TestEnv {
    let dir = TempDir::new().unwrap();
    let config = AppConfig {
        data_dir: dir.path().join("data"),
        ..Default::default()
    };

    let core = Arc::new(RecordingCore::default());
    let boundary = Arc::new(FakeBoundary::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let runtime = TunnelRuntime::with_parts(
        config,
        Arc::new(FakeFetcher),
        core.clone(),
        boundary.clone(),
        notifier.clone(),
    )
    .await
    .unwrap();

    TestEnv {
        dir,
        runtime,
        core,
        boundary,
        notifier,
    }
}

#[tokio::test]
async fn test_download_select_start_stop() {
    let env = setup().await;
    let store = env.runtime.subscription_store();
    assert!(store.is_empty());

    let sub = store.download("https://example.test/sub1").await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(sub.alias, "sub1");
    assert!(sub.updated_at <= current_time_millis());

    let state_path = env.dir.path().join("state.toml");
    let mut selection = SelectionState::default();
    assert!(selection.select(&sub.id));
    selection.save(&state_path).unwrap();
    let selection = SelectionState::load(&state_path).unwrap();

    let tunnel = env.runtime.tunnel();
    tunnel
        .start(&selection.current, &ProxySettings::default())
        .await
        .unwrap();
    assert_eq!(tunnel.state(), TunnelState::Running);

    let started = env.core.started.lock().unwrap().clone();
    assert_eq!(started.len(), 1);
    let compiled = &started[0];
    assert_eq!(compiled.config_path, store.payload_path(&sub.id).unwrap());
    assert_eq!(compiled.inbound.protocol, "socks");
    assert_eq!(compiled.inbound.sniffing.dest_override, vec!["http", "tls"]);

    let endpoint = tunnel.status().endpoint.unwrap();
    assert_eq!(compiled.inbound.port, endpoint.port());
    assert_eq!(*env.boundary.forwarded.lock().unwrap(), vec![endpoint]);
    assert!(env.boundary.settings.lock().unwrap()[0].ipv6.is_none());

    tunnel.stop(StopReason::UserInitiated).await;
    assert_eq!(
        tunnel.state(),
        TunnelState::Stopped(StopCause::Requested(StopReason::UserInitiated))
    );
    assert_eq!(*env.core.stops.lock().unwrap(), 1);
    assert_eq!(
        *env.notifier.sent.lock().unwrap(),
        vec!["The user stopped the provider.".to_string()]
    );

    env.runtime.shutdown().await;
}

#[tokio::test]
async fn test_start_without_selection_is_misconfigured() {
    let env = setup().await;
    env.runtime
        .subscription_store()
        .download("https://example.test/sub1")
        .await
        .unwrap();

    let err = env
        .runtime
        .tunnel()
        .start(&ActiveSubscriptionRef::new(""), &ProxySettings::default())
        .await
        .unwrap_err();

    assert!(matches!(err, TunnelError::MisconfiguredActiveSubscription(_)));
    assert!(err.is_fatal());
    assert!(env.core.started.lock().unwrap().is_empty());
    assert!(env.boundary.settings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_settings_are_snapshotted_per_start() {
    let env = setup().await;
    let store = env.runtime.subscription_store();
    let sub = store.download("https://example.test/sub1").await.unwrap();
    let active = ActiveSubscriptionRef::from(&sub.id);
    let tunnel = env.runtime.tunnel();

    let mut settings = ProxySettings::default();
    settings.sniffing = SniffingPolicy {
        enabled: true,
        http: true,
        tls: true,
        quic: true,
        fakedns: true,
        ..Default::default()
    };
    settings.network.ipv6_enabled = true;

    tunnel.start(&active, &settings).await.unwrap();
    tunnel.stop(StopReason::ConfigurationFailed).await;
    tunnel.start(&active, &ProxySettings::default()).await.unwrap();

    let started = env.core.started.lock().unwrap().clone();
    assert_eq!(started[0].inbound.sniffing.dest_override, vec!["fakedns+others"]);
    assert_eq!(started[1].inbound.sniffing.dest_override, vec!["http", "tls"]);

    let settings = env.boundary.settings.lock().unwrap().clone();
    assert!(settings[0].ipv6.is_some());
    assert!(settings[1].ipv6.is_none());

    assert_eq!(
        env.notifier.sent.lock().unwrap()[0],
        "The provider could not be configured."
    );
}

#[tokio::test]
async fn test_deleted_subscription_cannot_start() {
    let env = setup().await;
    let store = env.runtime.subscription_store();
    let sub = store.download("https://example.test/sub1").await.unwrap();
    store.delete(&sub.id).await.unwrap();

    let err = env
        .runtime
        .tunnel()
        .start(&ActiveSubscriptionRef::from(&sub.id), &ProxySettings::default())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}
