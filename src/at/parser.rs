//! Pure parsing: one preprocessed command line → AtHandler callbacks.
//!
//! No I/O, no device state. Every tokenizing step is explicitly
//! fallible; `handle_line` collapses a parse failure into the reply
//! `"ERROR"` and a handler's explicit error into that handler's reply
//! text. There are no other ways out of a line.

use log::info;

use super::chars;
use super::{AtHandler, CommandError};

/// Parse failure with the position it was noticed at (for the log).
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: &'static str,
    pub position: usize,
}

enum LineError {
    Parse(ParseError),
    Handler(CommandError),
}

impl From<ParseError> for LineError {
    fn from(e: ParseError) -> Self {
        LineError::Parse(e)
    }
}

impl From<CommandError> for LineError {
    fn from(e: CommandError) -> Self {
        LineError::Handler(e)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.bump();
        }
    }

    fn error(&self, message: &'static str) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }
}

/// Delete control characters (V.250 5.2.2) and upper-case letters
/// (V.250 5.1). Idempotent.
pub fn preprocess(line: &[u8]) -> Vec<u8> {
    line.iter()
        .copied()
        .filter(|&b| !chars::is_control(b))
        .map(chars::upper)
        .collect()
}

/// Run one logical command line against `handler` and return the reply
/// to push to the response buffer.
///
/// Commands execute left to right. The reply is `"OK"` unless the line
/// contained a dial (empty reply; the dial result arrives later via
/// the response buffer), a handler refused a command (its reply text,
/// verbatim), or the line failed to parse (`"ERROR"`).
pub fn handle_line(handler: &mut dyn AtHandler, raw_line: &[u8]) -> String {
    info!(
        "AT parser: parsing \"{}\"",
        String::from_utf8_lossy(raw_line)
    );

    let line = preprocess(raw_line);
    let mut cur = Cursor::new(&line);
    let mut result = String::from("OK");

    while !cur.at_end() {
        // Each parse_* leaves the cursor at the character after the
        // command it consumed.
        let step = match cur.peek() {
            Some(b'+') => parse_extended(&mut cur, handler),
            Some(b'S') => parse_s_parameter(&mut cur, handler),
            Some(b'D') => parse_dial(&mut cur, handler).map(|()| result.clear()),
            _ => parse_basic(&mut cur, handler),
        };

        match step {
            Ok(()) => {}
            Err(LineError::Handler(CommandError(reply))) => return reply,
            Err(LineError::Parse(e)) => {
                info!(
                    "AT parser: {} in input \"{}\" at character {}",
                    e.message,
                    String::from_utf8_lossy(&line),
                    e.position + 1
                );
                return String::from("ERROR");
            }
        }
    }

    result
}

/// One alpha, optionally `\`- or `&`-prefixed, then an optional
/// decimal argument with leading zeros dropped (V.250 5.3.1).
fn parse_basic(cur: &mut Cursor, handler: &mut dyn AtHandler) -> Result<(), LineError> {
    let mut cmd = String::new();

    if let Some(b @ (b'\\' | b'&')) = cur.peek() {
        cmd.push(b as char);
        cur.bump();
    }

    match cur.peek() {
        Some(b) if chars::is_alpha(b) => {
            cmd.push(b as char);
            cur.bump();
        }
        _ => return Err(cur.error("Expected alphabetical character for command").into()),
    }

    let mut arg = String::new();
    let mut skipped_zero = false;
    while let Some(b) = cur.peek() {
        if !chars::is_numeric(b) {
            break;
        }
        if b == b'0' && arg.is_empty() {
            skipped_zero = true;
        } else {
            arg.push(b as char);
        }
        cur.bump();
    }

    // An argument of all zeros must not end up looking absent
    if arg.is_empty() && skipped_zero {
        arg.push('0');
    }

    handler.handle_command(&cmd, &arg)?;
    Ok(())
}

/// `+NAME`, `+NAME?`, `+NAME=?`, `+NAME=arg,...` — V.250 5.4.
/// Spaces between tokens are skipped; spaces inside quoted arguments
/// are literal, spaces inside unquoted arguments are dropped.
fn parse_extended(cur: &mut Cursor, handler: &mut dyn AtHandler) -> Result<(), LineError> {
    let mut cmd = String::new();

    cur.bump(); // '+'
    cur.skip_spaces();

    match cur.peek() {
        Some(b) if chars::is_alpha(b) => {
            cmd.push(b as char);
            cur.bump();
        }
        _ => {
            return Err(cur
                .error("Expected alphabetical character for first char of extended cmd")
                .into())
        }
    }

    cur.skip_spaces();

    loop {
        match cur.peek() {
            None => {
                // Bare command name: execute with zero arguments
                handler.handle_extended(&cmd, &[])?;
                return Ok(());
            }
            Some(b) if chars::is_ext_char(b) => {
                cmd.push(b as char);
                cur.bump();
                cur.skip_spaces();
            }
            Some(b'?') => {
                handler.get_extended_parameter(&cmd)?;
                cur.bump();
                return Ok(());
            }
            Some(b'=') => break,
            Some(_) => {
                return Err(cur
                    .error("Expected character valid for extended syntax command")
                    .into())
            }
        }
    }

    cur.bump(); // '='

    if cur.at_end() {
        // Line ends right after the equals sign: one empty argument
        handler.handle_extended(&cmd, &[String::new()])?;
        return Ok(());
    }

    if cur.peek() == Some(b'?') {
        handler.query_extended(&cmd)?;
        cur.bump();
        cur.skip_spaces();
        match cur.peek() {
            None => return Ok(()),
            Some(b';') => {
                cur.bump();
                return Ok(());
            }
            Some(_) => {
                return Err(cur
                    .error("Expected semicolon after querying extended command")
                    .into())
            }
        }
    }

    let mut args: Vec<String> = Vec::new();

    while !cur.at_end() && cur.peek() != Some(b';') {
        cur.skip_spaces();

        if cur.at_end() {
            args.push(String::new());
            break;
        }

        let mut arg = String::new();

        if cur.peek() == Some(b'"') {
            cur.bump();
            parse_string_constant(cur, &mut arg)?;
            cur.skip_spaces();
            match cur.peek() {
                None | Some(b',') | Some(b';') => {}
                Some(_) => {
                    return Err(cur
                        .error("Expected end of argument after end of string constant")
                        .into())
                }
            }
        } else {
            while let Some(b) = cur.peek() {
                if b == b',' || b == b';' {
                    break;
                }
                if b == b'=' {
                    return Err(cur.error("Unexpected equals sign in argument").into());
                }
                if b != b' ' {
                    arg.push(b as char);
                }
                cur.bump();
            }
        }

        if cur.peek() == Some(b',') {
            cur.bump();
        }

        args.push(arg);
    }

    if cur.peek() == Some(b';') {
        cur.bump();
    }

    // The parser cannot tell an extended-syntax execute (V.250
    // 5.4.3.1) from a parameter set (5.4.4.2); the handler decides.
    handler.handle_extended(&cmd, &args)?;
    Ok(())
}

/// Body of a quoted string constant. The opening quote has been
/// consumed; consumes up to and including the closing quote. `\hh`
/// escapes a byte by two hex digits.
fn parse_string_constant(cur: &mut Cursor, out: &mut String) -> Result<(), ParseError> {
    while let Some(b) = cur.peek() {
        match b {
            b'"' => {
                cur.bump();
                return Ok(());
            }
            b'\\' => {
                cur.bump();
                let mut code: u8 = 0;
                for _ in 0..2 {
                    match cur.peek() {
                        None | Some(b'"') => {
                            return Err(
                                cur.error("Unexpected end of string in escape sequence")
                            )
                        }
                        Some(h) if chars::is_hex(h) => {
                            code = code * 16 + chars::hex_value(h);
                            cur.bump();
                        }
                        Some(_) => {
                            return Err(cur.error("Invalid character in escape sequence"))
                        }
                    }
                }
                out.push(char::from(code));
            }
            _ => {
                out.push(char::from(b));
                cur.bump();
            }
        }
    }

    Err(cur.error("Unterminated string constant"))
}

/// `S<n>?`, `S<n>=<v>`, `S<n>=` — index capped at 99, value at 999.
fn parse_s_parameter(cur: &mut Cursor, handler: &mut dyn AtHandler) -> Result<(), LineError> {
    cur.bump(); // 'S'
    cur.skip_spaces();

    let mut param: u16 = 0;
    while let Some(b) = cur.peek() {
        if !chars::is_numeric(b) {
            break;
        }
        param = param * 10 + u16::from(chars::dec_value(b));
        if param > 99 {
            return Err(cur.error("Too high S-parameter").into());
        }
        cur.bump();
    }

    match cur.peek() {
        None => return Err(cur.error("Unexpected end of line in S-parameter").into()),
        Some(b'?') => {
            cur.bump();
            handler.get_s_parameter(param)?;
            return Ok(());
        }
        Some(b'=') => cur.bump(),
        Some(_) => return Err(cur.error("Unexpected character in S-parameter").into()),
    }

    if cur.at_end() {
        // "S3=" — V.250 5.3.2 leaves this open; reset to default
        handler.reset_s_parameter(param)?;
        return Ok(());
    }

    let mut value: u16 = 0;
    while let Some(b) = cur.peek() {
        if !chars::is_numeric(b) {
            break;
        }
        value = value * 10 + u16::from(chars::dec_value(b));
        if value > 999 {
            return Err(cur.error("Too high S-parameter value").into());
        }
        cur.bump();
    }

    handler.set_s_parameter(param, value)?;
    Ok(())
}

/// `D` swallows the rest of the line as the dial string. The
/// semicolon suffix ("return to command state") is not supported.
fn parse_dial(cur: &mut Cursor, handler: &mut dyn AtHandler) -> Result<(), LineError> {
    cur.bump(); // 'D'

    let mut dial_string = String::new();
    while let Some(b) = cur.peek() {
        if b == b';' {
            return Err(cur.error("Semicolon after dial string not supported").into());
        }
        dial_string.push(char::from(b));
        cur.bump();
    }

    handler.handle_dial(&dial_string)?;
    Ok(())
}
