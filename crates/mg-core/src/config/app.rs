//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Configuration for the tunnel runtime and CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding cached subscriptions and core runtime files
    pub data_dir: PathBuf,

    /// Capacity of the core log channel; messages beyond it are dropped
    pub log_channel_capacity: usize,

    /// Proxy core process settings
    pub core: CoreConfig,

    /// Tunnel interface settings
    pub tunnel: TunnelConfig,

    /// Subscription fetch settings
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mango");

        Self {
            data_dir,
            log_channel_capacity: 1024,
            core: CoreConfig::default(),
            tunnel: TunnelConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Root directory of the subscription store
    pub fn subscriptions_dir(&self) -> PathBuf {
        self.data_dir.join("subscriptions")
    }

    /// Directory the core writes its generated fragments into
    pub fn run_dir(&self) -> PathBuf {
        self.data_dir.join("run")
    }
}

/// Proxy core process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Core executable (looked up on PATH when relative)
    pub binary: PathBuf,

    /// Directory with geoip/geosite assets
    pub asset_dir: Option<PathBuf>,

    /// How long to wait for the core to report startup
    #[serde(with = "duration_secs")]
    pub startup_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("xray"),
            asset_dir: None,
            startup_timeout: Duration::from_secs(10),
        }
    }
}

/// Tunnel interface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Loopback address the core's inbound listens on
    pub listen_address: IpAddr,

    /// DNS resolvers handed to the OS
    pub dns_servers: Vec<String>,

    /// Tunnel MTU
    pub mtu: u32,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            dns_servers: vec!["8.8.8.8".to_string(), "114.114.114.114".to_string()],
            mtu: 9000,
        }
    }
}

/// Subscription fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// User-Agent header sent with fetches
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("mango/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            data_dir = "/tmp/mango"

            [core]
            binary = "/usr/local/bin/xray"
            "#,
        )
        .unwrap();

        assert_eq!(config.subscriptions_dir(), PathBuf::from("/tmp/mango/subscriptions"));
        assert_eq!(config.core.binary, PathBuf::from("/usr/local/bin/xray"));
        assert_eq!(config.core.startup_timeout, Duration::from_secs(10));
        assert_eq!(config.tunnel.mtu, 9000);
        assert!(config.tunnel.listen_address.is_loopback());
    }

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.tunnel.dns_servers, vec!["8.8.8.8", "114.114.114.114"]);
        assert_eq!(parsed.fetch.timeout, Duration::from_secs(30));
    }
}
