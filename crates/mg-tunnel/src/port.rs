//! Loopback port allocation for the core's inbound listener
//!
//! The OS picks the port (bind to port 0); the allocator additionally
//! remembers every port it has leased so a port still held by this process
//! is never handed out twice. A [`PortLease`] gives its port back on drop.

use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;

use dashmap::DashSet;

use mg_core::error::PortError;

/// How many times to ask the OS before giving up
const MAX_ATTEMPTS: usize = 16;

/// Hands out free loopback ports
#[derive(Debug, Clone, Default)]
pub struct PortAllocator {
    leased: Arc<DashSet<u16>>,
}

impl PortAllocator {
    /// Create an allocator with no outstanding leases
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease a free port on the given loopback address
    pub fn allocate(&self, ip: IpAddr) -> Result<PortLease, PortError> {
        if !ip.is_loopback() {
            return Err(PortError::NoPortAvailable(format!(
                "{} is not a loopback address",
                ip
            )));
        }

        for _ in 0..MAX_ATTEMPTS {
            let port = {
                let listener = TcpListener::bind((ip, 0))
                    .map_err(|e| PortError::NoPortAvailable(format!("bind {}: {}", ip, e)))?;
                listener
                    .local_addr()
                    .map_err(|e| PortError::NoPortAvailable(e.to_string()))?
                    .port()
            };

            if self.leased.insert(port) {
                tracing::debug!("Leased port {} on {}", port, ip);
                return Ok(PortLease {
                    addr: SocketAddr::new(ip, port),
                    leased: Arc::clone(&self.leased),
                });
            }

            tracing::debug!("OS returned already-leased port {}, retrying", port);
        }

        Err(PortError::NoPortAvailable(format!(
            "no unleased port after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    /// Whether a port is currently leased
    pub fn is_leased(&self, port: u16) -> bool {
        self.leased.contains(&port)
    }

    /// Number of outstanding leases
    pub fn leased_count(&self) -> usize {
        self.leased.len()
    }
}

/// A leased port; released when dropped
#[derive(Debug)]
pub struct PortLease {
    addr: SocketAddr,
    leased: Arc<DashSet<u16>>,
}

impl PortLease {
    /// The leased port
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Full socket address of the lease
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.leased.remove(&self.addr.port());
        tracing::debug!("Released port {}", self.addr.port());
    }
}
