//! Connection Layer
//!
//! Accepts bytes from TCP clients and turns them into request/reply
//! traffic. Each accepted socket is owned by exactly one async task that
//! guarantees close on all exit paths; read and write failures terminate
//! only that connection.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               TCP Listener (main)            │
//! └──────────────────────┬───────────────────────┘
//!                        │ accept()
//!                        ▼
//!            spawn handle_connection(...) per client
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │              ConnectionHandler               │
//! │  read bytes ─> frame line ─> execute ─> write│
//! └──────────────────────────────────────────────┘
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ServerStats};
