//! Modem adapter emulation core
//!
//! Emulates the serial-line modem peripheral that plugs into a game
//! console's external expansion (EXI) bus. The guest drives the device
//! through a small register file multiplexed over immediate and DMA
//! bus transfers; the device interprets Hayes/V.250 AT commands and
//! tunnels the online data stream over a host TCP connection.
//!
//! ## Architecture (Hexagonal / Ports & Adapters)
//!
//! - `domain/` - Pure domain types, errors, configuration
//! - `ports/` - Trait definitions for host collaborators (scheduler,
//!   guest memory, transport, resolver, interrupt line)
//! - `at/` - V.250 AT command lexer/parser and the handler capability
//! - `device/` - Register front-end, byte buffers, modem core
//! - `adapters/` - Implementations of ports (TCP, fixed resolver,
//!   manual scheduler, flat guest memory)
//!
//! The device is single-threaded by design: every register access and
//! every scheduler callback runs on the host emulator thread, one at a
//! time. The only blocking call is the TCP connect inside the dial
//! callback; all subsequent socket I/O is non-blocking.

// Core domain (pure, no I/O)
pub mod at;
pub mod domain;
pub mod ports;

// Device core
pub mod device;

// Adapters (external I/O)
pub mod adapters;

pub use device::ModemAdapter;
pub use domain::{ModemConfig, ModemError, ModemResult};
