//! Per (market, symbol) trailing-window accumulator.
//!
//! Two independent rules are evaluated against a [`Stat`]:
//!
//! - **single trade**, inline on every [`Stat::update`]: the trade's raw
//!   quantity reaches the currency's configured limit;
//! - **window**, from a periodic timer via [`Stat::duration_check`]: at least
//!   `min_count` trades on one side each exceeded `limit_millions` of notional.
//!
//! The ingestion thread appends while the timer reads, so the mutable state
//! sits behind one mutex per key.

use std::collections::VecDeque;

use aggwatch_core::time_util;
use aggwatch_core::types::currency_of;
use aggwatch_core::{AggressorSide, MarketType, TradeEvent};
use chrono::FixedOffset;
use parking_lot::Mutex;

use crate::alert::format::{self, SideTotals};

/// Registry key: one [`Stat`] per market and pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatKey {
    pub market: MarketType,
    pub symbol: String,
}

impl StatKey {
    pub fn new(market: MarketType, symbol: impl Into<String>) -> Self {
        Self { market, symbol: symbol.into() }
    }
}

impl std::fmt::Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.market.tag(), self.symbol)
    }
}

/// Window alert texts for both sides; `None` where the side did not qualify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowAlerts {
    pub sell: Option<String>,
    pub buy: Option<String>,
}

impl WindowAlerts {
    pub fn is_empty(&self) -> bool {
        self.sell.is_none() && self.buy.is_none()
    }
}

impl IntoIterator for WindowAlerts {
    type Item = String;
    type IntoIter = std::iter::Flatten<std::array::IntoIter<Option<String>, 2>>;

    /// Sell first, then buy.
    fn into_iter(self) -> Self::IntoIter {
        [self.sell, self.buy].into_iter().flatten()
    }
}

#[derive(Debug, Default)]
struct Window {
    last: Option<TradeEvent>,
    events: VecDeque<TradeEvent>,
    /// `price × quantity` of `last`; display only.
    last_notional: f64,
}

/// Trailing window of trades for one [`StatKey`].
#[derive(Debug)]
pub struct Stat {
    key: StatKey,
    currency: String,
    window_secs: u64,
    inner: Mutex<Window>,
}

impl Stat {
    /// `window_secs` is only used to label window alerts; eviction uses the
    /// value passed to each [`update`](Self::update).
    pub fn new(key: StatKey, window_secs: u64) -> Self {
        let currency = currency_of(&key.symbol).to_string();
        Self { key, currency, window_secs, inner: Mutex::new(Window::default()) }
    }

    pub fn key(&self) -> &StatKey {
        &self.key
    }

    /// Base currency the single-trade limit is looked up by (`BTC` for `BTCUSDT`).
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Record a trade against the wall clock. See [`update_at`](Self::update_at).
    pub fn update(&self, event: TradeEvent, window_secs: u64, qty_limit: Option<f64>) -> bool {
        self.update_at(event, window_secs, qty_limit, time_util::now_ms())
    }

    /// Record a trade, evicting everything older than `window_secs` before `now_ms`.
    ///
    /// Returns `true` when the trade's quantity is at or above `qty_limit`.
    /// Without a limit the single-trade rule never fires.
    pub fn update_at(&self, event: TradeEvent, window_secs: u64, qty_limit: Option<f64>, now_ms: u64) -> bool {
        let horizon_ms = window_secs.saturating_mul(1000);
        let quantity = event.quantity;
        let notional = event.notional();

        let mut w = self.inner.lock();
        w.events.retain(|e| now_ms.saturating_sub(e.event_time_ms) <= horizon_ms);
        w.last = Some(event.clone());
        w.events.push_back(event);
        w.last_notional = notional;
        drop(w);

        qty_limit.is_some_and(|limit| quantity >= limit)
    }

    pub fn last(&self) -> Option<TradeEvent> {
        self.inner.lock().last.clone()
    }

    pub fn last_notional(&self) -> f64 {
        self.inner.lock().last_notional
    }

    pub fn window_len(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// Qualifying totals per side: trades whose notional exceeds
    /// `limit_millions × 1e6`. Returns `None` for an empty window.
    pub fn side_totals(&self, limit_millions: f64) -> Option<(SideTotals, SideTotals)> {
        let limit = limit_millions * 1_000_000.0;
        let w = self.inner.lock();
        if w.events.is_empty() {
            return None;
        }
        let mut sell = SideTotals::new(AggressorSide::Sell);
        let mut buy = SideTotals::new(AggressorSide::Buy);
        for event in w.events.iter().filter(|e| e.notional() > limit) {
            match event.side() {
                AggressorSide::Sell => sell.add(event),
                AggressorSide::Buy => buy.add(event),
            }
        }
        Some((sell, buy))
    }

    /// Window rule: an alert per side with at least `min_count` qualifying trades.
    ///
    /// Reads the window as left by the last update; no eviction happens here.
    pub fn duration_check(&self, limit_millions: f64, min_count: usize, offset: FixedOffset) -> WindowAlerts {
        let Some((sell, buy)) = self.side_totals(limit_millions) else {
            return WindowAlerts::default();
        };
        let time = time_util::format_ms(time_util::now_ms(), offset);
        let render = |totals: SideTotals| {
            (totals.count >= min_count)
                .then(|| format::window_text(&self.key.symbol, self.key.market, self.window_secs, &totals, &time))
        };
        WindowAlerts { sell: render(sell), buy: render(buy) }
    }

    /// Single-trade alert text for the most recent trade.
    pub fn single_alert(&self, offset: FixedOffset) -> Option<String> {
        let (last, notional) = {
            let w = self.inner.lock();
            (w.last.clone()?, w.last_notional)
        };
        let time = time_util::format_ms(time_util::now_ms(), offset);
        Some(format::single_trade_text(&last, notional, &time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggwatch_core::time_util::offset_hours;

    const T0: u64 = 1_700_000_000_000;

    fn trade(price: f64, qty: f64, sell: bool, t: u64) -> TradeEvent {
        TradeEvent {
            symbol: "BTCUSDT".into(),
            market: MarketType::Spot,
            price,
            quantity: qty,
            side: if sell { AggressorSide::Sell } else { AggressorSide::Buy },
            event_time_ms: t,
        }
    }

    fn stat() -> Stat {
        Stat::new(StatKey::new(MarketType::Spot, "BTCUSDT"), 60)
    }

    #[test]
    fn currency_is_derived_from_symbol() {
        assert_eq!(stat().currency(), "BTC");
        assert_eq!(stat().key().to_string(), "spot_BTCUSDT");
    }

    #[test]
    fn single_trade_rule_ignores_price() {
        let s = stat();
        assert!(s.update_at(trade(0.01, 100.0, false, T0), 60, Some(100.0), T0));
        assert!(s.update_at(trade(1e9, 100.0, true, T0), 60, Some(100.0), T0));
        assert!(!s.update_at(trade(1e9, 99.99, true, T0), 60, Some(100.0), T0));
        assert!(!s.update_at(trade(1.0, 1e12, true, T0), 60, None, T0), "no limit, no alert");
    }

    #[test]
    fn update_evicts_entries_outside_window() {
        let s = stat();
        for i in 0..10u64 {
            let t = T0 + i * 10_000;
            s.update_at(trade(1.0, 1.0, false, t), 60, None, t);
        }
        // Now is T0 + 90s: entries at T0 .. T0+20s are older than 60s.
        assert_eq!(s.window_len(), 7);

        let late = T0 + 1_000_000;
        s.update_at(trade(1.0, 1.0, false, late), 60, None, late);
        assert_eq!(s.window_len(), 1);
    }

    #[test]
    fn boundary_entry_is_kept() {
        let s = stat();
        s.update_at(trade(1.0, 1.0, false, T0), 60, None, T0);
        s.update_at(trade(1.0, 1.0, false, T0 + 60_000), 60, None, T0 + 60_000);
        assert_eq!(s.window_len(), 2);
        s.update_at(trade(1.0, 1.0, false, T0 + 60_001), 60, None, T0 + 60_001);
        assert_eq!(s.window_len(), 2);
    }

    #[test]
    fn records_last_trade_and_notional() {
        let s = stat();
        assert!(s.last().is_none());
        s.update_at(trade(50_000.0, 2.0, true, T0), 60, None, T0);
        assert_eq!(s.last().map(|e| e.quantity), Some(2.0));
        assert_eq!(s.last_notional(), 100_000.0);
    }

    #[test]
    fn empty_window_has_no_alerts() {
        let alerts = stat().duration_check(1.0, 5, offset_hours(8));
        assert_eq!(alerts, WindowAlerts::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn five_large_sells_alert_sell_only() {
        let s = stat();
        for i in 0..5 {
            s.update_at(trade(50_000.0, 30.0, true, T0 + i), 60, None, T0 + i);
        }
        // Large buys below the count, small buys below the notional.
        for i in 0..4 {
            s.update_at(trade(50_000.0, 30.0, false, T0 + i), 60, None, T0 + i);
        }
        for i in 0..10 {
            s.update_at(trade(50_000.0, 1.0, false, T0 + i), 60, None, T0 + i);
        }

        let alerts = s.duration_check(1.0, 5, offset_hours(8));
        let sell = alerts.sell.clone().unwrap();
        assert!(alerts.buy.is_none());
        assert!(sell.contains("*Side*: Sell\n"));
        assert!(sell.contains("*Count*: 5\n"));
        assert!(sell.contains("*Total quantity*: 150\n"));
        assert!(sell.contains("*Total notional*: 7.5M\n"));
        assert_eq!(alerts.into_iter().count(), 1);
    }

    #[test]
    fn notional_must_exceed_limit_strictly() {
        let s = stat();
        for i in 0..5 {
            // Exactly 1M each.
            s.update_at(trade(50_000.0, 20.0, false, T0 + i), 60, None, T0 + i);
        }
        let (sell, buy) = s.side_totals(1.0).unwrap();
        assert_eq!(sell.count, 0);
        assert_eq!(buy.count, 0);
        assert!(s.duration_check(1.0, 5, offset_hours(8)).is_empty());
    }

    #[test]
    fn single_alert_uses_last_trade() {
        let s = stat();
        assert!(s.single_alert(offset_hours(8)).is_none());
        s.update_at(trade(50_000.0, 150.0, true, T0), 60, Some(100.0), T0);
        let text = s.single_alert(offset_hours(8)).unwrap();
        assert!(text.contains("*Quantity*: 150\n"));
        assert!(text.contains("*Notional*: 7.5M\n"));
    }

    #[test]
    fn concurrent_updates_and_checks() {
        let s = std::sync::Arc::new(stat());
        let writers: Vec<_> = (0..4)
            .map(|n| {
                let s = s.clone();
                std::thread::spawn(move || {
                    for i in 0..1000u64 {
                        s.update_at(trade(50_000.0, 30.0, n % 2 == 0, T0 + i), 3600, None, T0 + i);
                    }
                })
            })
            .collect();
        let reader = {
            let s = s.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let _ = s.duration_check(1.0, 5, offset_hours(0));
                }
            })
        };
        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(s.window_len(), 4000);
    }
}
