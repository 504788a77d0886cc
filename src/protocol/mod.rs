//! Wire Protocol Implementation
//!
//! tidekv speaks a line-oriented command dialect: requests are
//! CRLF-terminated lines of whitespace-separated tokens, and replies use a
//! small typed grammar (status, error, integer, bulk, array).
//!
//! ## Modules
//!
//! - `parser`: incremental line framing and tokenization of requests
//! - `types`: the `Reply` enum, its wire encoding, and score formatting

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse, ParseError, ParseResult, Request};
pub use types::{format_score, Reply};
