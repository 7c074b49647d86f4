//! Number resolver port

use std::net::SocketAddr;

use crate::domain::ModemResult;

/// Trait for translating a dialed number into a peer address.
///
/// The tone/pulse indicator (`T`/`P`) has already been stripped from
/// the number by the time a resolver sees it.
pub trait NumberResolver {
    /// Resolve `number` to an address, or fail (the guest then sees
    /// `NO CARRIER`).
    fn resolve(&self, number: &str) -> ModemResult<SocketAddr>;
}
