//! OS network settings for the virtual interface

use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};

use mg_core::config::{NetworkPolicy, TunnelConfig};

/// Placeholder remote address reported for the tunnel
pub const TUNNEL_REMOTE_ADDRESS: Ipv4Addr = Ipv4Addr::new(254, 1, 1, 1);

const IPV4_ADDRESS: Ipv4Addr = Ipv4Addr::new(198, 18, 0, 1);
const IPV4_SUBNET_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 0, 0);
const IPV6_ADDRESS: Ipv6Addr = Ipv6Addr::new(0xfd6e, 0xa81b, 0x704f, 0x1211, 0, 0, 0, 1);
const IPV6_PREFIX_LEN: u8 = 64;

/// Settings applied to the OS before the core is started
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSettings {
    pub tunnel_remote_address: Ipv4Addr,
    pub mtu: u32,
    pub ipv4: Ipv4Settings,
    /// Absent entirely when IPv6 is disabled
    pub ipv6: Option<Ipv6Settings>,
    pub dns_servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv4Settings {
    pub address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub included_routes: Vec<Ipv4Route>,
    pub excluded_routes: Vec<Ipv4Route>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ipv4Route {
    pub destination: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
}

impl Ipv4Route {
    pub const DEFAULT: Ipv4Route = Ipv4Route {
        destination: Ipv4Addr::UNSPECIFIED,
        subnet_mask: Ipv4Addr::UNSPECIFIED,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv6Settings {
    pub address: Ipv6Addr,
    pub prefix_len: u8,
    pub included_routes: Vec<Ipv6Route>,
    pub excluded_routes: Vec<Ipv6Route>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ipv6Route {
    pub destination: Ipv6Addr,
    pub prefix_len: u8,
}

impl Ipv6Route {
    pub const DEFAULT: Ipv6Route = Ipv6Route {
        destination: Ipv6Addr::UNSPECIFIED,
        prefix_len: 0,
    };
}

/// Build the interface settings for a tunnel start
pub fn network_settings(policy: &NetworkPolicy, tunnel: &TunnelConfig) -> NetworkSettings {
    let ipv4 = Ipv4Settings {
        address: IPV4_ADDRESS,
        subnet_mask: IPV4_SUBNET_MASK,
        included_routes: vec![Ipv4Route::DEFAULT],
        excluded_routes: if policy.hide_tunnel_icon {
            vec![Ipv4Route {
                destination: Ipv4Addr::UNSPECIFIED,
                subnet_mask: Ipv4Addr::new(255, 0, 0, 0),
            }]
        } else {
            Vec::new()
        },
    };

    let ipv6 = policy.ipv6_enabled.then(|| Ipv6Settings {
        address: IPV6_ADDRESS,
        prefix_len: IPV6_PREFIX_LEN,
        included_routes: vec![Ipv6Route::DEFAULT],
        excluded_routes: if policy.hide_tunnel_icon {
            vec![Ipv6Route {
                destination: Ipv6Addr::UNSPECIFIED,
                prefix_len: 64,
            }]
        } else {
            Vec::new()
        },
    });

    NetworkSettings {
        tunnel_remote_address: TUNNEL_REMOTE_ADDRESS,
        mtu: tunnel.mtu,
        ipv4,
        ipv6,
        dns_servers: tunnel.dns_servers.clone(),
    }
}
