//! Storage Layer
//!
//! The keyspace, the sorted-set structure, and the background expiry
//! driver.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  Keyspace                     │
//! │  RwLock ┌────────────────┐ ┌───────────────┐  │
//! │         │ key -> Value   │ │ key -> expiry │  │
//! │         │ {Str | ZSet}   │ │   instant     │  │
//! │         └────────────────┘ └───────────────┘  │
//! └───────────────────────────────────────────────┘
//!                       ▲
//!                       │ bounded sweep per tick
//!         ┌─────────────┴─────────────┐
//!         │        ExpiryDriver       │
//!         │   (background tokio task) │
//!         └───────────────────────────┘
//! ```
//!
//! Keys past their expiry instant are logically deleted: reads treat them
//! as missing (lazy expiry) and the driver reclaims the ones nobody
//! touches again (active expiry).

pub mod engine;
pub mod expiry;
pub mod zset;

// Re-export commonly used types
pub use engine::{Keyspace, Value, WrongType};
pub use expiry::{start_expiry_driver, ExpiryConfig, ExpiryDriver};
pub use zset::SortedSet;
