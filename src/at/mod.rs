//! AT (Hayes/V.250) command layer
//!
//! This module separates the two concerns of AT command handling:
//! - `parser`: translate one command line → handler callbacks (pure,
//!   no I/O, no device state)
//! - the `AtHandler` trait: the capability the parser drives; the
//!   device core implements it
//!
//! The parser is a set of free functions over a byte cursor, so the
//! device can hand itself in as the handler without any back-reference
//! cycle: `parser::handle_line(self, line)`.

pub mod chars;
pub mod parser;

pub use parser::{handle_line, preprocess};

/// Explicit error reply from a handler callback.
///
/// The contained text is pushed to the response buffer verbatim and
/// aborts the rest of the command line. Distinct from a parse error,
/// which always collapses to `"ERROR"`.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandError(pub String);

impl CommandError {
    pub fn new(reply: impl Into<String>) -> Self {
        Self(reply.into())
    }
}

/// Capability the parser invokes while walking a command line.
///
/// Execution order is left to right; the first callback returning
/// `Err` stops the line. Implementations that do not care about a
/// command accept it silently (`Ok(())`), which leaves the default
/// `"OK"` reply in place.
pub trait AtHandler {
    /// Basic command: one letter, optionally `\`- or `&`-prefixed,
    /// with a normalized decimal argument (`""` if absent).
    fn handle_command(&mut self, command: &str, arg: &str) -> Result<(), CommandError>;

    /// Dial command. The whole rest of the line is the dial string.
    fn handle_dial(&mut self, dial_string: &str) -> Result<(), CommandError>;

    /// Extended command execute/set (`+CMD`, `+CMD=...`). Whether the
    /// argument list means "execute" or "set" is V.250 5.4.4.2's
    /// problem and therefore the handler's.
    fn handle_extended(&mut self, command: &str, args: &[String]) -> Result<(), CommandError>;

    /// Extended command test form (`+CMD=?`).
    fn query_extended(&mut self, command: &str) -> Result<(), CommandError>;

    /// Extended command read form (`+CMD?`).
    fn get_extended_parameter(&mut self, command: &str) -> Result<(), CommandError>;

    /// `S<n>=<v>`
    fn set_s_parameter(&mut self, index: u16, value: u16) -> Result<(), CommandError>;

    /// `S<n>?`
    fn get_s_parameter(&mut self, index: u16) -> Result<(), CommandError>;

    /// `S<n>=` with no value: reset to default.
    fn reset_s_parameter(&mut self, index: u16) -> Result<(), CommandError>;
}
