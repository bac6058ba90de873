//! Enumerations used throughout aggwatch.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Exchange identifiers
// ---------------------------------------------------------------------------

/// Supported cryptocurrency exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    #[default]
    Binance,
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "Binance"),
        }
    }
}

// ---------------------------------------------------------------------------
// Market types
// ---------------------------------------------------------------------------

/// Market (instrument) category a trade was printed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Spot,
    PerpetualFutures,
}

impl MarketType {
    /// Short lowercase tag, used in registry keys and log labels.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::PerpetualFutures => "perp",
        }
    }
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spot => write!(f, "Spot"),
            Self::PerpetualFutures => write!(f, "Perpetual"),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggressor side
// ---------------------------------------------------------------------------

/// The side whose order crossed the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggressorSide {
    Buy,
    Sell,
}

impl AggressorSide {
    /// Binance sets `m` (buyer is maker) when the seller was the aggressor.
    #[inline]
    pub fn from_buyer_maker(is_buyer_maker: bool) -> Self {
        if is_buyer_maker { Self::Sell } else { Self::Buy }
    }
}

impl std::fmt::Display for AggressorSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buyer_maker_means_sell_aggressor() {
        assert_eq!(AggressorSide::from_buyer_maker(true), AggressorSide::Sell);
        assert_eq!(AggressorSide::from_buyer_maker(false), AggressorSide::Buy);
    }

    #[test]
    fn market_type_serde_names() {
        let m: MarketType = serde_json::from_str("\"perpetual_futures\"").unwrap();
        assert_eq!(m, MarketType::PerpetualFutures);
        assert_eq!(MarketType::Spot.tag(), "spot");
    }
}
