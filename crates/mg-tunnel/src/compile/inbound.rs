//! Inbound listener descriptor
//!
//! The descriptor is generated fresh for every tunnel start and injected
//! next to the cached subscription payload; it is never merged into it.

use serde::Serialize;
use std::net::SocketAddr;

use mg_core::config::SniffingPolicy;

/// Tag the core uses for the tunnel's inbound
pub const INBOUND_TAG: &str = "socks-in";

/// Detect-list entry that replaces the full protocol set
pub const CATCH_ALL_DETECTOR: &str = "fakedns+others";

/// Listener configuration handed to the core at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundDescriptor {
    pub listen: String,
    pub port: u16,
    pub protocol: &'static str,
    pub settings: SocksSettings,
    pub tag: &'static str,
    pub sniffing: SniffingDocument,
}

/// SOCKS inbound options
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocksSettings {
    pub udp: bool,
    pub auth: &'static str,
}

/// Sniffing sub-document in the core's native key names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SniffingDocument {
    pub enabled: bool,
    pub dest_override: Vec<String>,
    pub metadata_only: bool,
    pub domains_excluded: Vec<String>,
    pub route_only: bool,
}

impl InboundDescriptor {
    /// Build the SOCKS inbound for an allocated loopback endpoint
    pub fn socks(endpoint: SocketAddr, sniffing: &SniffingPolicy) -> Self {
        Self {
            listen: endpoint.ip().to_string(),
            port: endpoint.port(),
            protocol: "socks",
            settings: SocksSettings {
                udp: true,
                auth: "noauth",
            },
            tag: INBOUND_TAG,
            sniffing: SniffingDocument::from(sniffing),
        }
    }

    /// Render the descriptor as a single JSON object
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&SniffingPolicy> for SniffingDocument {
    fn from(policy: &SniffingPolicy) -> Self {
        Self {
            enabled: policy.enabled,
            dest_override: dest_override(policy)
                .into_iter()
                .map(str::to_string)
                .collect(),
            metadata_only: policy.metadata_only,
            domains_excluded: policy.excluded_domains.clone(),
            route_only: policy.route_only,
        }
    }
}

/// Protocols the core should detect, in stable http/tls/quic/fakedns order
///
/// With every protocol enabled the list collapses to [`CATCH_ALL_DETECTOR`].
pub fn dest_override(policy: &SniffingPolicy) -> Vec<&'static str> {
    let detectors: Vec<&'static str> = [
        (policy.http, "http"),
        (policy.tls, "tls"),
        (policy.quic, "quic"),
        (policy.fakedns, "fakedns"),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect();

    if detectors.len() == 4 {
        vec![CATCH_ALL_DETECTOR]
    } else {
        detectors
    }
}
