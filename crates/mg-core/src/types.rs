//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Alias used when nothing usable can be derived from a source URL
pub const DEFAULT_ALIAS: &str = "Subscription";

/// Unique identifier for a subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Create a subscription ID from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// On-disk format of a subscription payload, as understood by the core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    Yaml,
    Toml,
}

impl PayloadFormat {
    /// Derive the format from the extension of the source URL's last path segment
    pub fn from_source(source: &Url) -> Self {
        let extension = last_segment(source)
            .and_then(|segment| segment.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => PayloadFormat::Yaml,
            Some("toml") => PayloadFormat::Toml,
            _ => PayloadFormat::Json,
        }
    }

    /// File extension used when caching the payload
    pub fn extension(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "json",
            PayloadFormat::Yaml => "yaml",
            PayloadFormat::Toml => "toml",
        }
    }
}

/// A remote-sourced proxy configuration with a cached payload
///
/// The payload itself is owned by the subscription store; this struct is the
/// metadata that travels with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Immutable identity
    pub id: SubscriptionId,
    /// Remote source the payload is fetched from
    pub source: Url,
    /// Display name
    pub alias: String,
    /// Format of the cached payload
    #[serde(default)]
    pub format: PayloadFormat,
    /// Last successful fetch, Unix milliseconds
    pub updated_at: u64,
}

impl Subscription {
    /// Create a subscription for a freshly fetched source
    pub fn new(source: Url, updated_at: u64) -> Self {
        Self {
            id: SubscriptionId::generate(),
            alias: alias_from_source(&source),
            format: PayloadFormat::from_source(&source),
            source,
            updated_at,
        }
    }

    /// File name of the cached payload
    pub fn payload_file_name(&self) -> String {
        format!("config.{}", self.format.extension())
    }
}

/// Derive a display name from a subscription source
///
/// Uses the last path segment without its extension, then the host, then
/// [`DEFAULT_ALIAS`].
pub fn alias_from_source(source: &Url) -> String {
    if let Some(segment) = last_segment(source) {
        let stem = match segment.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => segment,
        };
        if !stem.is_empty() {
            return stem.to_string();
        }
    }

    source
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_ALIAS.to_string())
}

fn last_segment(source: &Url) -> Option<&str> {
    source
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
}

/// Reference to the selected subscription; an empty string means none
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveSubscriptionRef(String);

impl ActiveSubscriptionRef {
    /// Select the given subscription
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// No subscription selected
    pub fn none() -> Self {
        Self(String::new())
    }

    /// The selected ID, if any
    pub fn id(&self) -> Option<SubscriptionId> {
        if self.0.is_empty() {
            None
        } else {
            Some(SubscriptionId::new(self.0.clone()))
        }
    }

    /// Whether nothing is selected
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the given subscription is the selected one
    pub fn is(&self, id: &SubscriptionId) -> bool {
        self.0 == id.as_str()
    }

    /// Get the raw reference string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&SubscriptionId> for ActiveSubscriptionRef {
    fn from(id: &SubscriptionId) -> Self {
        Self(id.as_str().to_string())
    }
}

/// Why the host stopped the tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    None,
    UserInitiated,
    ProviderFailed,
    NoNetwork,
    UnrecoverableNetworkChange,
    ProviderDisabled,
    AuthCanceled,
    ConfigurationFailed,
    IdleTimeout,
    ConfigurationDisabled,
    ConfigurationRemoved,
    Superseded,
    UserLogout,
    UserSwitch,
    ConnectionFailed,
    Sleep,
    AppUpdate,
    /// A code this build does not know about
    Unknown(i64),
}

const KNOWN_REASONS: [(StopReason, &str); 17] = [
    (StopReason::None, "none"),
    (StopReason::UserInitiated, "user-initiated"),
    (StopReason::ProviderFailed, "provider-failed"),
    (StopReason::NoNetwork, "no-network"),
    (StopReason::UnrecoverableNetworkChange, "unrecoverable-network-change"),
    (StopReason::ProviderDisabled, "provider-disabled"),
    (StopReason::AuthCanceled, "auth-canceled"),
    (StopReason::ConfigurationFailed, "configuration-failed"),
    (StopReason::IdleTimeout, "idle-timeout"),
    (StopReason::ConfigurationDisabled, "configuration-disabled"),
    (StopReason::ConfigurationRemoved, "configuration-removed"),
    (StopReason::Superseded, "superseded"),
    (StopReason::UserLogout, "user-logout"),
    (StopReason::UserSwitch, "user-switch"),
    (StopReason::ConnectionFailed, "connection-failed"),
    (StopReason::Sleep, "sleep"),
    (StopReason::AppUpdate, "app-update"),
];

impl StopReason {
    /// Decode a host stop-reason code
    pub fn from_code(code: i64) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|index| KNOWN_REASONS.get(index))
            .map(|(reason, _)| *reason)
            .unwrap_or(StopReason::Unknown(code))
    }

    /// Host stop-reason code
    pub fn code(&self) -> i64 {
        match self {
            StopReason::Unknown(code) => *code,
            known => KNOWN_REASONS
                .iter()
                .position(|(reason, _)| reason == known)
                .map(|index| index as i64)
                .unwrap_or(-1),
        }
    }

    /// Human-readable diagnostic; `None` for unknown codes
    pub fn message(&self) -> Option<&'static str> {
        let message = match self {
            StopReason::None => "No specific reason.",
            StopReason::UserInitiated => "The user stopped the provider.",
            StopReason::ProviderFailed => "The provider failed.",
            StopReason::NoNetwork => "There is no network connectivity.",
            StopReason::UnrecoverableNetworkChange => "The device attached to a new network.",
            StopReason::ProviderDisabled => "The provider was disabled.",
            StopReason::AuthCanceled => "The authentication process was cancelled.",
            StopReason::ConfigurationFailed => "The provider could not be configured.",
            StopReason::IdleTimeout => "The provider was idle for too long.",
            StopReason::ConfigurationDisabled => "The associated configuration was disabled.",
            StopReason::ConfigurationRemoved => "The associated configuration was deleted.",
            StopReason::Superseded => "A high-priority configuration was started.",
            StopReason::UserLogout => "The user logged out.",
            StopReason::UserSwitch => "The active user changed.",
            StopReason::ConnectionFailed => "Failed to establish connection.",
            StopReason::Sleep => {
                "The device went to sleep and disconnectOnSleep is enabled in the configuration."
            }
            StopReason::AppUpdate => "The NEProvider is being updated.",
            StopReason::Unknown(_) => return None,
        };
        Some(message)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Unknown(code) => write!(f, "unknown({})", code),
            known => {
                let name = KNOWN_REASONS
                    .iter()
                    .find(|(reason, _)| reason == known)
                    .map(|(_, name)| *name)
                    .unwrap_or("unknown");
                write!(f, "{}", name)
            }
        }
    }
}

impl FromStr for StopReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if let Some((reason, _)) = KNOWN_REASONS.iter().find(|(_, name)| *name == needle) {
            return Ok(*reason);
        }
        needle
            .parse::<i64>()
            .map(StopReason::from_code)
            .map_err(|_| format!("unknown stop reason: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_alias_from_last_path_segment() {
        assert_eq!(alias_from_source(&url("https://example.test/sub1")), "sub1");
        assert_eq!(
            alias_from_source(&url("https://example.test/api/v1/clash.yaml")),
            "clash"
        );
        assert_eq!(alias_from_source(&url("https://example.test/a/b/")), "b");
    }

    #[test]
    fn test_alias_falls_back_to_host_then_default() {
        assert_eq!(
            alias_from_source(&url("https://sub.example.test/")),
            "sub.example.test"
        );
        assert_eq!(alias_from_source(&url("file:///")), DEFAULT_ALIAS);
    }

    #[test]
    fn test_payload_format_from_extension() {
        assert_eq!(
            PayloadFormat::from_source(&url("https://example.test/sub1")),
            PayloadFormat::Json
        );
        assert_eq!(
            PayloadFormat::from_source(&url("https://example.test/c.YML")),
            PayloadFormat::Yaml
        );
        assert_eq!(
            PayloadFormat::from_source(&url("https://example.test/c.toml?token=x")),
            PayloadFormat::Toml
        );
    }

    #[test]
    fn test_new_subscription_gets_unique_id() {
        let a = Subscription::new(url("https://example.test/sub1"), 1);
        let b = Subscription::new(url("https://example.test/sub1"), 1);
        assert_ne!(a.id, b.id);
        assert_eq!(a.payload_file_name(), "config.json");
    }

    #[test]
    fn test_active_ref_empty_means_none() {
        let none = ActiveSubscriptionRef::none();
        assert!(none.is_none());
        assert!(none.id().is_none());

        let id = SubscriptionId::new("abc");
        let active = ActiveSubscriptionRef::from(&id);
        assert!(active.is(&id));
        assert_eq!(active.id(), Some(id));
    }

    #[test]
    fn test_stop_reason_codes_roundtrip() {
        for (index, (reason, _)) in KNOWN_REASONS.iter().enumerate() {
            assert_eq!(StopReason::from_code(index as i64), *reason);
            assert_eq!(reason.code(), index as i64);
        }
        assert_eq!(StopReason::from_code(99), StopReason::Unknown(99));
        assert_eq!(StopReason::from_code(-1), StopReason::Unknown(-1));
    }

    #[test]
    fn test_stop_reason_messages() {
        assert_eq!(
            StopReason::UserInitiated.message(),
            Some("The user stopped the provider.")
        );
        assert_eq!(
            StopReason::Superseded.message(),
            Some("A high-priority configuration was started.")
        );
        assert_eq!(StopReason::Unknown(42).message(), None);
    }

    #[test]
    fn test_stop_reason_parse() {
        assert_eq!(
            "user-initiated".parse::<StopReason>().unwrap(),
            StopReason::UserInitiated
        );
        assert_eq!("15".parse::<StopReason>().unwrap(), StopReason::Sleep);
        assert!("sideways".parse::<StopReason>().is_err());
        assert_eq!(StopReason::AppUpdate.to_string(), "app-update");
    }
}
