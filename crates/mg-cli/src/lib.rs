//! mango: command-line interface for Mango
//!
//! Manages proxy subscriptions and runs the tunnel in the foreground.

pub mod commands;
pub mod output;
