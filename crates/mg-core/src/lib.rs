//! mg-core: Core types and configuration for Mango
//!
//! This crate provides the shared domain types, proxy settings, error
//! taxonomy and configuration files used by the tunnel runtime and the CLI.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::MgError;
pub use types::{ActiveSubscriptionRef, PayloadFormat, StopReason, Subscription, SubscriptionId};
