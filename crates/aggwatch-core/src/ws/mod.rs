//! WebSocket connector with auto-reconnect and a pluggable frame handler.

pub mod client;
pub mod connector;
pub mod context;
pub mod handler;
pub mod options;

pub use client::SocketHandle;
pub use connector::{Connector, ConnectorSettings};
pub use context::{ConnectionContext, ConnectionStatus};
pub use handler::{ControlFrame, FrameHandler, KeepAlive, NoopHandler};
pub use options::ConnectOptions;
