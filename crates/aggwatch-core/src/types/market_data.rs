//! Market data structures flowing from the decoder into the aggregator.
//!
//! # Timestamp convention
//!
//! Event times are kept in **milliseconds since Unix epoch**, exactly as the
//! exchange sends them in the `E` field.

use serde::{Deserialize, Serialize};

use super::enums::{AggressorSide, MarketType};

/// One aggregated trade print, decoded from a stream frame.
///
/// Immutable once created; dropped when it leaves the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub market: MarketType,
    pub price: f64,
    pub quantity: f64,
    pub side: AggressorSide,
    pub event_time_ms: u64,
}

impl TradeEvent {
    /// Trade value in quote currency (`price × quantity`).
    #[inline]
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    #[inline]
    pub fn side(&self) -> AggressorSide {
        self.side
    }
}
