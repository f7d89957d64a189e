//! Config compiler
//!
//! Renders typed [`ProxySettings`] into what the core and the OS consume.
//! The subscription payload is passed through by path and never rewritten;
//! the inbound descriptor and log directives travel next to it.

mod inbound;
mod network;

pub use inbound::{
    dest_override, InboundDescriptor, SniffingDocument, SocksSettings, CATCH_ALL_DETECTOR,
    INBOUND_TAG,
};
pub use network::{
    network_settings, Ipv4Route, Ipv4Settings, Ipv6Route, Ipv6Settings, NetworkSettings,
    TUNNEL_REMOTE_ADDRESS,
};

use std::net::SocketAddr;
use std::path::PathBuf;

use mg_core::config::{LogSeverity, LoggingPolicy, ProxySettings};
use mg_core::PayloadFormat;

/// Logging thresholds forwarded verbatim to the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDirectives {
    pub access_log: bool,
    pub dns_log: bool,
    pub error_severity: LogSeverity,
}

impl From<&LoggingPolicy> for LogDirectives {
    fn from(policy: &LoggingPolicy) -> Self {
        Self {
            access_log: policy.access_log,
            dns_log: policy.dns_log,
            error_severity: policy.error_severity,
        }
    }
}

/// Everything the core needs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledConfig {
    /// Cached subscription payload, unmodified
    pub config_path: PathBuf,
    pub format: PayloadFormat,
    pub inbound: InboundDescriptor,
    pub log: LogDirectives,
}

/// Combine settings, the cached payload and the allocated endpoint
pub fn compile(
    settings: &ProxySettings,
    config_path: PathBuf,
    format: PayloadFormat,
    endpoint: SocketAddr,
) -> CompiledConfig {
    CompiledConfig {
        config_path,
        format,
        inbound: InboundDescriptor::socks(endpoint, &settings.sniffing),
        log: LogDirectives::from(&settings.logging),
    }
}
