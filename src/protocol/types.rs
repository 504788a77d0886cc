//! Reply Types for the Wire Protocol
//!
//! This module defines the replies tidekv sends back to clients and their
//! wire encoding.
//!
//! ## Reply Grammar
//!
//! Every reply is one of five kinds, each terminated with CRLF:
//!
//! - Status: `+<text>\r\n`
//! - Error: `-<message>\r\n`
//! - Integer: `:<decimal>\r\n`
//! - Bulk: `+<text>\r\n` when a value is present, `$-1\r\n` for null
//! - Array: `*<N>\r\n` followed by N items, each encoded as `+<text>\r\n`
//!
//! Note that a present bulk value is written as an inline `+` line rather
//! than the length-prefixed `$<len>` form, and array items are always
//! inline `+` lines. Clients of this dialect depend on that framing; do not
//! "fix" it toward standard RESP.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator ending every reply line
pub const CRLF: &[u8] = b"\r\n";

/// Reply type prefixes
pub mod prefix {
    pub const STATUS: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const NULL_BULK: &[u8] = b"$-1";
    pub const ARRAY: u8 = b'*';
}

/// A single reply to a client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Non-binary status line, e.g. `+OK`
    Status(String),

    /// Error line, e.g. `-ERR syntax error`
    Error(String),

    /// 64-bit signed integer, e.g. `:42`
    Integer(i64),

    /// A single value (`+<text>`) or the null marker (`$-1`)
    Bulk(Option<Bytes>),

    /// A counted sequence of inline items, each written as `+<text>`
    Array(Vec<Bytes>),
}

impl Reply {
    /// Creates a status reply.
    pub fn status(s: impl Into<String>) -> Self {
        Reply::Status(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Creates an integer reply.
    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Creates a present bulk reply.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(Some(data.into()))
    }

    /// Creates the null bulk reply.
    pub fn null() -> Self {
        Reply::Bulk(None)
    }

    /// Creates an array reply from pre-rendered items.
    pub fn array(items: Vec<Bytes>) -> Self {
        Reply::Array(items)
    }

    /// The `+OK` status.
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// The `+PONG` status.
    pub fn pong() -> Self {
        Reply::Status("PONG".to_string())
    }

    /// The error for commands hitting a key of the other variant.
    pub fn wrong_type() -> Self {
        Reply::Error(
            "WRONGTYPE operation against a key holding the wrong kind of value".to_string(),
        )
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Serializes the reply to its wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    ///
    /// This is more efficient than `serialize()` when reusing a buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Status(s) => {
                buf.push(prefix::STATUS);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Bulk(Some(data)) => {
                buf.push(prefix::STATUS);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Reply::Bulk(None) => {
                buf.extend_from_slice(prefix::NULL_BULK);
                buf.extend_from_slice(CRLF);
            }
            Reply::Array(items) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for item in items {
                    buf.push(prefix::STATUS);
                    buf.extend_from_slice(item);
                    buf.extend_from_slice(CRLF);
                }
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(Some(data)) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Reply::Bulk(None) => write!(f, "(nil)"),
            Reply::Array(items) => {
                if items.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    for (i, item) in items.iter().enumerate() {
                        writeln!(f, "{}) {}", i + 1, String::from_utf8_lossy(item))?;
                    }
                    Ok(())
                }
            }
        }
    }
}

/// Formats a score for the wire: fixed six digits after the decimal point,
/// never exponent notation. Negative zero is normalized so that it prints
/// as `0.000000`.
pub fn format_score(score: f64) -> String {
    let score = if score == 0.0 { 0.0 } else { score };
    format!("{:.6}", score)
}
