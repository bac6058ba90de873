//! Alert message texts (Telegram Markdown).
//!
//! Amounts are rounded half-up to two decimals with trailing zeros stripped.
//! Notional values are shown in millions of quote currency, so `2_500_000`
//! renders as `2.5M`. The closing hashtag line makes alerts searchable in the
//! channel (`#single #BTCUSDT #Sell #Spot`).

use aggwatch_core::{AggressorSide, Exchange, MarketType, TradeEvent};
use rust_decimal::prelude::*;

/// Per-side totals of the qualifying trades in a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideTotals {
    pub side: AggressorSide,
    pub count: usize,
    pub quantity: f64,
    pub notional: f64,
}

impl SideTotals {
    pub fn new(side: AggressorSide) -> Self {
        Self { side, count: 0, quantity: 0.0, notional: 0.0 }
    }

    pub fn add(&mut self, event: &TradeEvent) {
        self.count += 1;
        self.quantity += event.quantity;
        self.notional += event.notional();
    }
}

/// Half-up to 2 decimals, trailing zeros stripped: `0.125 → "0.13"`, `2.50 → "2.5"`.
pub fn format_amount(v: f64) -> String {
    match Decimal::from_f64(v) {
        Some(d) => d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero).normalize().to_string(),
        // NaN, infinities and values beyond Decimal's range.
        None => format!("{v:.2}"),
    }
}

/// Quote amount in millions: `1_234_567.891 → "1.23"`.
pub fn format_millions(v: f64) -> String {
    format_amount(v / 1_000_000.0)
}

fn hashtags(kind: &str, symbol: &str, side: AggressorSide, market: MarketType) -> String {
    format!("#{kind} #{symbol} #{side} #{market}")
}

/// Alert for one trade at or above the single-trade quantity limit.
pub fn single_trade_text(event: &TradeEvent, notional: f64, time: &str) -> String {
    let side = event.side();
    format!(
        "Single trade alert\n\
         *Exchange*: {}\n\
         *Market*: {}\n\
         *Time*: {time}\n\
         *Pair*: {}\n\
         *Side*: {side}\n\
         *Quantity*: {}\n\
         *Price*: {}\n\
         *Notional*: {}M\n\
         {}",
        Exchange::Binance,
        event.market,
        event.symbol,
        event.quantity,
        event.price,
        format_millions(notional),
        hashtags("single", &event.symbol, side, event.market),
    )
}

/// Alert for a side with enough large trades inside the trailing window.
pub fn window_text(symbol: &str, market: MarketType, window_secs: u64, totals: &SideTotals, time: &str) -> String {
    format!(
        "Window alert ({window_secs}s)\n\
         *Exchange*: {}\n\
         *Market*: {market}\n\
         *Time*: {time}\n\
         *Pair*: {symbol}\n\
         *Side*: {}\n\
         *Count*: {}\n\
         *Total quantity*: {}\n\
         *Total notional*: {}M\n\
         {}",
        Exchange::Binance,
        totals.side,
        totals.count,
        format_amount(totals.quantity),
        format_millions(totals.notional),
        hashtags("window", symbol, totals.side, market),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_round_half_up_and_strip_zeros() {
        assert_eq!(format_amount(2.5), "2.5");
        assert_eq!(format_amount(2.0), "2");
        assert_eq!(format_amount(0.125), "0.13");
        assert_eq!(format_amount(-0.125), "-0.13");
        assert_eq!(format_amount(1.234), "1.23");
        assert_eq!(format_amount(0.0), "0");
    }

    #[test]
    fn millions() {
        assert_eq!(format_millions(2_500_000.0), "2.5");
        assert_eq!(format_millions(1_234_567.891), "1.23");
        assert_eq!(format_millions(10_000_000.0), "10");
    }

    #[test]
    fn non_finite_does_not_panic() {
        assert_eq!(format_amount(f64::NAN), "NaN");
        assert_eq!(format_amount(f64::INFINITY), "inf");
    }

    #[test]
    fn single_trade_layout() {
        let ev = TradeEvent {
            symbol: "BTCUSDT".into(),
            market: MarketType::Spot,
            price: 50_000.0,
            quantity: 150.0,
            side: AggressorSide::Sell,
            event_time_ms: 0,
        };
        let text = single_trade_text(&ev, ev.notional(), "2024-01-01 08:00:00");
        assert!(text.contains("*Exchange*: Binance\n"));
        assert!(text.contains("*Market*: Spot\n"));
        assert!(text.contains("*Time*: 2024-01-01 08:00:00\n"));
        assert!(text.contains("*Side*: Sell\n"));
        assert!(text.contains("*Quantity*: 150\n"));
        assert!(text.contains("*Notional*: 7.5M\n"));
        assert!(text.ends_with("#single #BTCUSDT #Sell #Spot"));
    }

    #[test]
    fn window_layout() {
        let totals = SideTotals { side: AggressorSide::Buy, count: 5, quantity: 60.004, notional: 6_000_400.0 };
        let text = window_text("ETHUSDT", MarketType::PerpetualFutures, 60, &totals, "t");
        assert!(text.starts_with("Window alert (60s)\n"));
        assert!(text.contains("*Market*: Perpetual\n"));
        assert!(text.contains("*Count*: 5\n"));
        assert!(text.contains("*Total quantity*: 60\n"));
        assert!(text.contains("*Total notional*: 6M\n"));
        assert!(text.ends_with("#window #ETHUSDT #Buy #Perpetual"));
    }
}
