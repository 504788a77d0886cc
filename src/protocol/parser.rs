//! Incremental Request Parser
//!
//! Requests arrive as CRLF-terminated lines of whitespace-separated tokens.
//! The first token is the command name; the rest are positional arguments
//! and option tokens. TCP is a stream, so a single read may contain a
//! partial line or several pipelined lines; the parser works incrementally
//! over a caller-owned buffer.
//!
//! The parser returns either:
//! - `Ok(Some((request, consumed)))` - a complete line was parsed,
//!   `consumed` bytes were used
//! - `Ok(None)` - no complete line yet, the caller should read more
//! - `Err(ParseError)` - the line cannot be accepted
//!
//! The caller appends incoming bytes, calls `parse()`, and on success
//! advances its buffer by `consumed`.

use bytes::Bytes;
use thiserror::Error;

/// Maximum accepted length of a single request line in bytes.
///
/// A buffer that grows past this without containing a line terminator is a
/// protocol violation and the connection is dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Errors that can occur while framing a request line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No terminator within the accepted line length
    #[error("request line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// One parsed request: the raw token vector of a single line.
///
/// Tokens are opaque byte strings; command-name casing and numeric parsing
/// are the dispatcher's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub tokens: Vec<Bytes>,
}

impl Request {
    /// The command name token, if the line was not empty.
    pub fn name(&self) -> Option<&Bytes> {
        self.tokens.first()
    }

    /// The argument tokens after the command name.
    pub fn args(&self) -> &[Bytes] {
        if self.tokens.is_empty() {
            &[]
        } else {
            &self.tokens[1..]
        }
    }
}

/// Attempts to parse one request line from the buffer.
///
/// A line is terminated by `\n`; a preceding `\r` is stripped. An empty or
/// all-whitespace line parses to a request with no tokens, which the
/// dispatcher rejects with an error reply rather than the connection
/// being dropped.
pub fn parse(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    let newline = match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None => {
            if buf.len() > MAX_LINE_BYTES {
                return Err(ParseError::LineTooLong {
                    len: buf.len(),
                    max: MAX_LINE_BYTES,
                });
            }
            return Ok(None);
        }
    };

    let mut line = &buf[..newline];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }

    let tokens = tokenize(line);
    Ok(Some((Request { tokens }, newline + 1)))
}

/// Splits a line into whitespace-separated tokens.
///
/// Runs of whitespace collapse, so `SET  k   v` parses the same as
/// `SET k v`.
fn tokenize(line: &[u8]) -> Vec<Bytes> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .map(Bytes::copy_from_slice)
        .collect()
}
