//! # aggwatch-core
//!
//! Core crate for aggwatch, providing:
//!
//! - **Types** (`types`) — market type, aggressor side, trade events, symbol helpers
//! - **Configuration** (`config`) — JSON config deserialization and validation
//! - **Error types** (`error`) — domain-specific `AggError` via thiserror
//! - **Scheduler** (`scheduler`) — cancellable repeating tasks
//! - **WebSocket** (`ws`) — reconnecting connector + frame handler protocol
//! - **Time utilities** (`time_util`) — epoch clocks and alert timestamps
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod time_util;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
