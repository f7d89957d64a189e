//! mg-tunnel: Subscription store and tunnel lifecycle for Mango
//!
//! Turns a selected subscription into a running proxy core and tears it
//! down again. The pieces, leaf-first:
//!
//! - [`port`]: loopback port leases for the core's inbound listener
//! - [`compile`]: renders [`mg_core::config::ProxySettings`] into the inbound
//!   descriptor, log directives and OS network settings
//! - [`engine`]: the proxy core boundary and its log channel
//! - [`store`]: the durable subscription collection
//! - [`session`]: the tunnel session state machine
//!
//! Host, OS and notification collaborators are traits in [`boundary`].

pub mod boundary;
pub mod compile;
pub mod engine;
pub mod port;
pub mod session;
pub mod state;
pub mod store;

pub use session::{TunnelOrchestrator, TunnelState};
pub use state::TunnelRuntime;
pub use store::SubscriptionStore;
