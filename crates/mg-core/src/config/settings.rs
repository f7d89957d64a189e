//! User-level proxy settings
//!
//! A [`ProxySettings`] value is read once per tunnel start and handed to the
//! config compiler as an immutable snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Snapshot of all user proxy settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub sniffing: SniffingPolicy,
    pub network: NetworkPolicy,
    pub logging: LoggingPolicy,
}

/// Core-side traffic sniffing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniffingPolicy {
    pub enabled: bool,
    pub http: bool,
    pub tls: bool,
    pub quic: bool,
    pub fakedns: bool,
    /// Domains the core must not sniff, passed through verbatim
    pub excluded_domains: Vec<String>,
    pub metadata_only: bool,
    pub route_only: bool,
}

impl Default for SniffingPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            http: true,
            tls: true,
            quic: false,
            fakedns: false,
            excluded_domains: Vec::new(),
            metadata_only: false,
            route_only: false,
        }
    }
}

/// Tunnel interface policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicy {
    pub ipv6_enabled: bool,
    /// Exclude part of the address space from the default route so the
    /// OS does not show the tunnel indicator
    pub hide_tunnel_icon: bool,
}

/// Core logging policy; forwarded to the core without local filtering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPolicy {
    pub access_log: bool,
    pub dns_log: bool,
    pub error_severity: LogSeverity,
}

/// Minimum severity of core error-log messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
    #[default]
    Silent,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Silent => "silent",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogSeverity {
    type Err = String;

    /// Case-insensitive; accepts `warn` as an alias for `warning`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogSeverity::Debug),
            "info" => Ok(LogSeverity::Info),
            "warning" | "warn" => Ok(LogSeverity::Warning),
            "error" => Ok(LogSeverity::Error),
            "silent" | "none" => Ok(LogSeverity::Silent),
            other => Err(format!("unknown log severity: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_sniffing_and_ipv6() {
        let settings = ProxySettings::default();
        assert!(!settings.sniffing.enabled);
        assert!(!settings.network.ipv6_enabled);
        assert_eq!(settings.logging.error_severity, LogSeverity::Silent);
    }

    #[test]
    fn test_settings_from_partial_toml() {
        let settings: ProxySettings = toml::from_str(
            r#"
            [sniffing]
            enabled = true
            quic = true
            excluded_domains = ["courier.push.apple.com"]

            [logging]
            error_severity = "warning"
            "#,
        )
        .unwrap();

        assert!(settings.sniffing.enabled);
        assert!(settings.sniffing.http);
        assert!(settings.sniffing.quic);
        assert_eq!(settings.sniffing.excluded_domains, vec!["courier.push.apple.com"]);
        assert_eq!(settings.logging.error_severity, LogSeverity::Warning);
        assert_eq!(settings.network, NetworkPolicy::default());
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("WARN".parse::<LogSeverity>().unwrap(), LogSeverity::Warning);
        assert_eq!("Error".parse::<LogSeverity>().unwrap(), LogSeverity::Error);
        assert!("loud".parse::<LogSeverity>().is_err());
    }
}
