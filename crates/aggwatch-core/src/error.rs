//! Typed error definitions for aggwatch.
//!
//! Provides [`AggError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use std::time::Duration;

use thiserror::Error;

/// Domain-specific errors for aggwatch.
#[derive(Debug, Error)]
pub enum AggError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The WebSocket handshake did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Market data parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Alert delivery error (transport or rejected by the sink).
    #[error("alert error: {0}")]
    Alert(String),
}
