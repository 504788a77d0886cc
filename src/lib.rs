//! # tidekv - An In-Memory Key-Value Server
//!
//! tidekv is an in-memory key-value database serving many concurrent TCP
//! clients. It speaks a line-oriented, Redis-flavored command dialect: one
//! CRLF-terminated request line in, one typed reply out.
//!
//! ## Features
//!
//! - **String keyspace** with `SET`/`GET`/`DEL`/`EXISTS` and conditional
//!   writes (`NX`)
//! - **Sorted sets** mapping members to float scores, with rank and range
//!   queries in `(score, member)` order
//! - **TTL support**: per-key expiry (`EX`, `EXPIRE`, `TTL`) with lazy
//!   expiry on access plus a background eviction driver
//! - **Async I/O**: built on Tokio, one task per connection, pipelining
//!   with in-order replies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          tidekv                             │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │      │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │             │
//! │  ┌─────────────┐    ┌─────────────────────────▼──────────┐  │
//! │  │ Line parser │    │             Keyspace               │  │
//! │  │ + replies   │    │  RwLock( key -> {Str | ZSet},      │  │
//! │  │             │    │          key -> expiry instant )   │  │
//! │  └─────────────┘    └─────────────────────────▲──────────┘  │
//! │                                               │             │
//! │                     ┌─────────────────────────┴──────────┐  │
//! │                     │            ExpiryDriver            │  │
//! │                     │        (background Tokio task)     │  │
//! │                     └────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Server
//! - `PING [message]`, `DBSIZE`, `FLUSHDB`
//!
//! ### Strings and keys
//! - `SET key value [EX seconds] [NX]`, `GET key`
//! - `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `EXPIRE key seconds`, `TTL key`
//!
//! ### Sorted sets
//! - `ZADD key score member [score member ...]`
//! - `ZREM key member [member ...]`
//! - `ZSCORE key member`, `ZCARD key`, `ZRANK key member`
//! - `ZRANGE key start stop [WITHSCORES]`
//! - `ZRANGEBYSCORE key min max [WITHSCORES]`
//!
//! ## Module Overview
//!
//! - [`protocol`]: request line framing and reply encoding
//! - [`storage`]: the keyspace, sorted sets, and expiry
//! - [`commands`]: the command table and handlers
//! - [`connection`]: per-client connection tasks
//!
//! ## Design Highlights
//!
//! Commands are atomic at the keyspace: all handlers and the expiry driver
//! serialize on a single `RwLock`, so every command observes a state
//! consistent with all previously completed commands and commits its
//! mutation indivisibly.
//!
//! Expired keys are reclaimed two ways: on access (lazy) and by a
//! background task sampling the expiry index (active), so memory is
//! returned even for keys no client ever touches again.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ServerStats};
pub use protocol::{ParseError, Reply, Request};
pub use storage::{start_expiry_driver, ExpiryConfig, ExpiryDriver, Keyspace};

/// Version of tidekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
