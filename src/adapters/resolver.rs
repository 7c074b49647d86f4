//! Dial-number resolution
//!
//! Guest software dials phone numbers, not IP addresses. The fixed
//! resolver sends every call to one configured peer, with one escape
//! hatch: a star-encoded number of the form `*40*a*b*c*d*port` dials
//! `a.b.c.d:port` directly.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use log::debug;

use crate::domain::{ModemConfig, ModemResult};
use crate::ports::NumberResolver;

pub struct FixedResolver {
    fallback: SocketAddr,
}

impl FixedResolver {
    pub fn new(fallback: SocketAddr) -> Self {
        Self { fallback }
    }
}

impl Default for FixedResolver {
    fn default() -> Self {
        Self::new(ModemConfig::default().fallback_peer)
    }
}

impl NumberResolver for FixedResolver {
    fn resolve(&self, number: &str) -> ModemResult<SocketAddr> {
        if let Some(addr) = parse_star_code(number) {
            debug!("star-encoded dial \"{number}\" -> {addr}");
            return Ok(addr);
        }
        debug!("dial \"{number}\" -> fallback {}", self.fallback);
        Ok(self.fallback)
    }
}

/// `*40*a*b*c*d*port` → `a.b.c.d:port`, or None for anything else.
fn parse_star_code(number: &str) -> Option<SocketAddr> {
    let rest = number.strip_prefix("*40*")?;
    let mut fields = rest.split('*');

    let mut octets = [0u8; 4];
    for octet in octets.iter_mut() {
        *octet = fields.next()?.parse().ok()?;
    }
    let port: u16 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || port == 0 {
        return None;
    }

    Some(SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]),
        port,
    )))
}
