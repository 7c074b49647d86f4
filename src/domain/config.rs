//! Device configuration
//!
//! A ModemConfig holds the tunables a host embeds the device with:
//! call-setup latency, receive poll cadence, and the peer address used
//! when a dial string does not encode one.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use serde::{Deserialize, Serialize};

fn default_connect_delay() -> u64 {
    500_000
}

fn default_recv_interval() -> u64 {
    50_000_000
}

fn default_fallback_peer() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 1, 1), 2468))
}

/// Tunables for one modem adapter instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Host-clock cycles between a dial command and the connect attempt
    #[serde(default = "default_connect_delay")]
    pub connect_delay_cycles: u64,
    /// Host-clock cycles between receive polls while connected
    #[serde(default = "default_recv_interval")]
    pub recv_interval_cycles: u64,
    /// Peer address used when the dial string carries no address of its own
    #[serde(default = "default_fallback_peer")]
    pub fallback_peer: SocketAddr,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            connect_delay_cycles: default_connect_delay(),
            recv_interval_cycles: default_recv_interval(),
            fallback_peer: default_fallback_peer(),
        }
    }
}
