//! Alert texts and their delivery.

pub mod dispatcher;
pub mod format;
pub mod sink;

pub use dispatcher::AlertDispatcher;
pub use sink::{AlertSink, LogSink, SinkResponse, TelegramSink};
