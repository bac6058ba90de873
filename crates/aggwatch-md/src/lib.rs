//! # aggwatch-md
//!
//! Binance aggTrade monitoring: decoding, trailing-window aggregation and
//! alert delivery.
//!
//! ## Architecture
//!
//! [`monitor::AggTradeMonitor`] opens one reconnecting stream per enabled
//! market, feeds decoded trades to a single ingestion thread that updates the
//! [`aggregator::StatRegistry`], and runs the windowed check on a timer. Both
//! rules hand their texts to an [`alert::AlertDispatcher`].
//!
//! ## Modules
//!
//! - [`binance`] — endpoints, combined-stream paths, aggTrade decoding
//! - [`aggregator`] — `Stat` windows and the concurrent registry
//! - [`alert`] — message texts, sinks (Telegram, log) and the dispatcher
//! - [`monitor`] — wiring of the above
//! - [`json_util`] — JSON parsing helpers

pub mod aggregator;
pub mod alert;
pub mod binance;
pub mod json_util;
pub mod monitor;

pub use monitor::{AggTradeMonitor, MonitorSettings};
