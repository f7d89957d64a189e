//! Tunnel session lifecycle state

use std::fmt;
use std::net::SocketAddr;

use serde::Serialize;

use mg_core::{StopReason, SubscriptionId};

use crate::port::PortLease;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Stopped by the host with an OS stop reason
    Requested(StopReason),
    /// Anything after subscription resolution failed during start
    CoreStartFailure,
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCause::Requested(reason) => write!(f, "{}", reason),
            StopCause::CoreStartFailure => write!(f, "core-start-failure"),
        }
    }
}

/// Lifecycle state of the tunnel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TunnelState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped(StopCause),
}

impl TunnelState {
    /// Whether a session currently occupies the tunnel
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TunnelState::Starting | TunnelState::Running | TunnelState::Stopping
        )
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Idle => write!(f, "idle"),
            TunnelState::Starting => write!(f, "starting"),
            TunnelState::Running => write!(f, "running"),
            TunnelState::Stopping => write!(f, "stopping"),
            TunnelState::Stopped(cause) => write!(f, "stopped ({})", cause),
        }
    }
}

impl Serialize for TunnelState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One tunnel run, from start request to stop completion
#[derive(Debug)]
pub struct TunnelSession {
    /// Subscription captured at start time
    pub subscription_id: SubscriptionId,
    /// Inbound port; released on drop
    pub lease: Option<PortLease>,
    /// Last error reported while starting the core
    pub last_error: Option<String>,
}

impl TunnelSession {
    pub fn new(subscription_id: SubscriptionId) -> Self {
        Self {
            subscription_id,
            lease: None,
            last_error: None,
        }
    }

    /// Inbound endpoint, once allocated
    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.lease.as_ref().map(PortLease::addr)
    }
}

/// Snapshot answered to status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelStatus {
    pub state: TunnelState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(TunnelState::Idle.to_string(), "idle");
        assert_eq!(
            TunnelState::Stopped(StopCause::Requested(StopReason::UserInitiated)).to_string(),
            "stopped (user-initiated)"
        );
        assert_eq!(
            TunnelState::Stopped(StopCause::CoreStartFailure).to_string(),
            "stopped (core-start-failure)"
        );
    }

    #[test]
    fn test_active_states() {
        assert!(TunnelState::Starting.is_active());
        assert!(TunnelState::Running.is_active());
        assert!(!TunnelState::Idle.is_active());
        assert!(!TunnelState::Stopped(StopCause::CoreStartFailure).is_active());
    }

    #[test]
    fn test_status_serializes_state_as_text() {
        let status = TunnelStatus {
            state: TunnelState::Running,
            subscription: Some(SubscriptionId::new("abc")),
            endpoint: Some("127.0.0.1:1080".parse().unwrap()),
            last_error: None,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "state": "running",
                "subscription": "abc",
                "endpoint": "127.0.0.1:1080",
            })
        );
    }
}
