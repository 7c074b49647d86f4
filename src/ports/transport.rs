//! Line transport port
//!
//! Split into two traits, mirroring how connections are made and used:
//! - `Dialer` — opens a connection to a peer address
//! - `LineTransport` — non-blocking byte I/O on an open connection
//!
//! `Dialer::connect` is the one call allowed to block the emulator
//! thread (it maps to a synchronous TCP connect). Everything returned
//! from it must already be in non-blocking mode.

use std::net::SocketAddr;

use crate::domain::ModemResult;

/// Outcome of a single non-blocking receive.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvOutcome {
    /// `n` bytes were placed at the start of the buffer (`n > 0`)
    Data(usize),
    /// Nothing available right now; try again later
    NotReady,
    /// The peer closed the connection or the transport failed
    Closed,
}

/// Trait for establishing a connection to the dialed peer.
pub trait Dialer {
    /// Connect to `addr`, returning a transport already in
    /// non-blocking mode. Blocks until the OS answers.
    fn connect(&mut self, addr: SocketAddr) -> ModemResult<Box<dyn LineTransport>>;
}

/// Trait for an open, non-blocking connection.
pub trait LineTransport {
    /// Send as much of `data` as the transport will take without
    /// blocking. Returns the number of bytes actually sent.
    fn send(&mut self, data: &[u8]) -> ModemResult<usize>;

    /// Receive into `buf` without blocking.
    fn recv(&mut self, buf: &mut [u8]) -> RecvOutcome;
}
