//! Subscription store and payload fetching

mod fetch;
mod subscriptions;

pub use fetch::{Fetcher, HttpFetcher};
pub use subscriptions::SubscriptionStore;
