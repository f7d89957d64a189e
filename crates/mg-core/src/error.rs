//! Core error types for Mango

use std::path::PathBuf;
use thiserror::Error;

use crate::types::SubscriptionId;

/// Top-level error type for the Mango ecosystem
#[derive(Error, Debug)]
pub enum MgError {
    /// Subscription store error
    #[error("Subscription error: {0}")]
    Store(#[from] StoreError),

    /// Port allocation error
    #[error("Port error: {0}")]
    Port(#[from] PortError),

    /// Proxy core error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Tunnel lifecycle error
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while fetching a subscription payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status
    #[error("Server returned HTTP {status}")]
    Status { status: u16 },

    /// The server answered with an empty body
    #[error("Subscription payload is empty")]
    EmptyBody,
}

/// Subscription store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Source is not a well-formed http(s) URL
    #[error("Invalid subscription source: {0}")]
    InvalidSource(String),

    /// Fetching the payload failed
    #[error("Failed to fetch subscription: {0}")]
    Fetch(#[from] FetchError),

    /// Another download or update for the same key is outstanding
    #[error("Operation already in progress for {0}")]
    AlreadyInProgress(String),

    /// Rename target is empty or equal to the current alias
    #[error("New name must be non-empty and differ from the current name")]
    NoOpRename,

    /// Subscription does not exist
    #[error("Subscription not found: {0}")]
    NotFound(SubscriptionId),

    /// Persisting the subscription failed
    #[error("Failed to persist subscription: {0}")]
    Io(#[from] std::io::Error),

    /// Stored metadata could not be encoded or decoded
    #[error("Invalid subscription metadata: {0}")]
    Metadata(String),
}

/// Port allocation errors
#[derive(Error, Debug)]
pub enum PortError {
    /// The OS could not supply a free loopback port
    #[error("No local port available: {0}")]
    NoPortAvailable(String),
}

/// Failure reported by the proxy core, carrying its native error text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail}")]
pub struct CoreError {
    /// Error text as reported by the core
    pub detail: String,
}

impl CoreError {
    /// Create a core error from the core's native error text
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Tunnel lifecycle errors
#[derive(Error, Debug)]
pub enum TunnelError {
    /// No usable active subscription; the embedding host is misconfigured
    #[error("Active subscription is misconfigured: {0}")]
    MisconfiguredActiveSubscription(String),

    /// A session is already starting or running
    #[error("Tunnel is already active")]
    AlreadyActive,

    /// The OS boundary rejected the network settings
    #[error("Failed to apply network settings: {0}")]
    NetworkSettings(String),

    /// Packet forwarding could not be attached to the inbound endpoint
    #[error("Failed to forward packets: {0}")]
    Forwarding(String),

    /// Port allocation failed
    #[error(transparent)]
    Port(#[from] PortError),

    /// The proxy core failed to start
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TunnelError {
    /// Whether this error signals an integration bug that must terminate the host
    pub fn is_fatal(&self) -> bool {
        matches!(self, TunnelError::MisconfiguredActiveSubscription(_))
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_misconfiguration_is_fatal() {
        assert!(TunnelError::MisconfiguredActiveSubscription("none selected".into()).is_fatal());
        assert!(!TunnelError::AlreadyActive.is_fatal());
        assert!(!TunnelError::Core(CoreError::new("boom")).is_fatal());
    }

    #[test]
    fn test_core_error_displays_detail_verbatim() {
        let err = CoreError::new("failed to load config: invalid character");
        assert_eq!(err.to_string(), "failed to load config: invalid character");

        let err: TunnelError = err.into();
        assert_eq!(err.to_string(), "failed to load config: invalid character");
    }
}
