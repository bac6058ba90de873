//! Binance aggTrade streams.
//!
//! One combined stream per market:
//! - Spot (`stream.binance.com`)
//! - USDⓈ-M perpetual (`fstream.binance.com`)
//!
//! Both carry `<symbol>@aggTrade` for every configured pair.

pub mod agg_trade;

use aggwatch_core::MarketType;
use aggwatch_core::config::MarketConfig;
use aggwatch_core::error::AggError;
use aggwatch_core::types::stream_name;
use aggwatch_core::ws::ConnectOptions;

pub const SPOT_HOST: &str = "stream.binance.com";
pub const PERPETUAL_HOST: &str = "fstream.binance.com";
pub const DEFAULT_PORT: u16 = 443;

/// Combined-stream path: `/stream?streams=btcusdt@aggTrade/ethusdt@aggTrade`.
pub fn combined_stream_path(symbols: &[String]) -> String {
    let streams: Vec<String> = symbols.iter().map(|s| stream_name(s, "aggTrade")).collect();
    format!("/stream?streams={}", streams.join("/"))
}

pub fn default_host(market: MarketType) -> &'static str {
    match market {
        MarketType::Spot => SPOT_HOST,
        MarketType::PerpetualFutures => PERPETUAL_HOST,
    }
}

/// Endpoint for one market, or `None` when the market is disabled or has no pairs.
///
/// Fails only on a malformed `endpoint` override.
pub fn connect_options(market: MarketType, cfg: &MarketConfig) -> Result<Option<ConnectOptions>, AggError> {
    if !cfg.is_enabled() {
        return Ok(None);
    }
    let symbols = cfg.effective_symbols();
    if symbols.is_empty() {
        return Ok(None);
    }
    let path = combined_stream_path(&symbols);
    let options = match cfg.endpoint_options()? {
        Some(base) => ConnectOptions::new(base.host(), base.port(), path, base.tls()),
        None => ConnectOptions::new(default_host(market), DEFAULT_PORT, path, true),
    };
    Ok(Some(options))
}
