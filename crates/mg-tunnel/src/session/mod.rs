//! Tunnel session management

mod orchestrator;
mod state;

pub use orchestrator::TunnelOrchestrator;
pub use state::{StopCause, TunnelSession, TunnelState, TunnelStatus};
