//! Domain error types

use thiserror::Error;

/// Errors that can occur inside the modem adapter.
///
/// None of these ever cross the bus boundary: a failed resolve or
/// connect surfaces to the guest as `NO CARRIER`, a dead transport
/// simply stops the receive poll. The enum exists for the transport,
/// resolver and snapshot internals.
#[derive(Error, Debug)]
pub enum ModemError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Resolver error: {0}")]
    Resolve(String),

    #[error("Guest memory error: {0}")]
    Memory(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Result type alias for modem adapter operations
pub type ModemResult<T> = Result<T, ModemError>;
