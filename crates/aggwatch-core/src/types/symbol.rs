//! Symbol helpers.
//!
//! Threshold config is keyed by base currency (`BTC`), while the feed reports
//! full pairs (`BTCUSDT`). Stream names are the lowercase pair plus a channel.

/// Quote assets stripped when deriving the base currency, longest first.
const QUOTE_ASSETS: &[&str] = &["FDUSD", "USDT", "USDC"];

/// Base currency of a pair: `"BTCUSDT"` → `"BTC"`.
///
/// Pairs without a known quote suffix are returned unchanged.
pub fn currency_of(symbol: &str) -> &str {
    QUOTE_ASSETS
        .iter()
        .find_map(|q| symbol.strip_suffix(q).filter(|base| !base.is_empty()))
        .unwrap_or(symbol)
}

/// Stream name for a pair and channel: `("BTCUSDT", "aggTrade")` → `"btcusdt@aggTrade"`.
pub fn stream_name(symbol: &str, channel: &str) -> String {
    format!("{}@{channel}", symbol.to_lowercase())
}
