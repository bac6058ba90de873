//! Configuration parsing for aggwatch.
//!
//! Everything is read from a single JSON config file. All fields are optional;
//! accessors apply the documented defaults so a minimal `{}` config listens to
//! BTC and ETH on both Binance spot and perpetual streams and logs alerts
//! instead of sending them.
//!
//! # Example config
//!
//! ```json
//! {
//!   "app": { "module_name": "aggwatch", "log_path": "/tmp/log" },
//!   "binance": {
//!     "spot": { "symbols": ["BTCUSDT", "ETHUSDT"] },
//!     "perpetual": { "symbols": ["BTCUSDT"] },
//!     "monitor_interval_ms": 3000,
//!     "keep_alive": { "min_secs": 5, "max_secs": 10 }
//!   },
//!   "alerts": {
//!     "window_secs": 60, "window_count": 5, "notional_limit_millions": 1,
//!     "qty_limits": { "BTC": 100, "ETH": 1000 }
//!   },
//!   "telegram": { "token": "123:abc", "chat_id": "-1001234" }
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AggError;
use crate::ws::ConnectOptions;

/// Pairs watched when a market block does not list its own symbols.
pub const DEFAULT_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT"];

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    pub app: Option<ModuleMeta>,

    /// Binance stream settings.
    pub binance: Option<BinanceConfig>,

    /// Alert thresholds and check cadence.
    pub alerts: Option<AlertConfig>,

    /// Telegram delivery. When absent alerts are only logged.
    pub telegram: Option<TelegramConfig>,
}

impl AppConfig {
    /// Returns the module name, defaulting to `"aggwatch"`.
    pub fn module_name(&self) -> String {
        self.app.as_ref().and_then(|m| m.module_name.clone()).unwrap_or_else(|| "aggwatch".into())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.app.as_ref().and_then(|m| m.log_path.clone())
    }

    pub fn binance(&self) -> BinanceConfig {
        self.binance.clone().unwrap_or_default()
    }

    pub fn alerts(&self) -> AlertConfig {
        self.alerts.clone().unwrap_or_default()
    }

    /// Reject values that would stall timers or produce nonsense windows.
    pub fn validate(&self) -> Result<(), AggError> {
        let binance = self.binance();
        if binance.monitor_interval().is_zero() {
            return Err(AggError::Config("binance.monitor_interval_ms must be > 0".into()));
        }
        if binance.connect_timeout().is_zero() {
            return Err(AggError::Config("binance.connect_timeout_ms must be > 0".into()));
        }
        let (min, max) = binance.keep_alive_range();
        if min.is_zero() || min > max {
            return Err(AggError::Config(format!(
                "binance.keep_alive range invalid: min={min:?} max={max:?}"
            )));
        }
        for (name, market) in [("spot", binance.spot()), ("perpetual", binance.perpetual())] {
            market
                .endpoint_options()
                .map_err(|e| AggError::Config(format!("binance.{name}.endpoint: {e}")))?;
        }

        let alerts = self.alerts();
        if alerts.window().is_zero() {
            return Err(AggError::Config("alerts.window_secs must be > 0".into()));
        }
        if alerts.check_interval().is_zero() {
            return Err(AggError::Config("alerts.check_interval_secs must be > 0".into()));
        }
        let offset = alerts.utc_offset_hours();
        if !(-23..=23).contains(&offset) {
            return Err(AggError::Config(format!("alerts.utc_offset_hours out of range: {offset}")));
        }
        let thresholds = alerts.thresholds();
        if thresholds.window_count == 0 {
            return Err(AggError::Config("alerts.window_count must be > 0".into()));
        }
        let limit = thresholds.notional_limit_millions;
        if !(limit.is_finite() && limit >= 0.0) {
            return Err(AggError::Config(format!("alerts.notional_limit_millions invalid: {limit}")));
        }

        if let Some(tg) = &self.telegram {
            if tg.token.is_empty() || tg.chat_id.is_empty() {
                return Err(AggError::Config("telegram.token and telegram.chat_id are required".into()));
            }
            if tg.max_in_flight() == 0 {
                return Err(AggError::Config("telegram.max_in_flight must be > 0".into()));
            }
        }
        Ok(())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Binance streams
// ---------------------------------------------------------------------------

/// Binance stream configuration: one connector per enabled market.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BinanceConfig {
    /// Spot aggTrade stream (`stream.binance.com`).
    pub spot: Option<MarketConfig>,

    /// USDⓈ-M perpetual aggTrade stream (`fstream.binance.com`).
    pub perpetual: Option<MarketConfig>,

    /// Connector monitor tick in milliseconds (default: 3000).
    pub monitor_interval_ms: Option<u64>,

    /// WebSocket handshake timeout in milliseconds (default: 10000).
    pub connect_timeout_ms: Option<u64>,

    /// Unsolicited ping jitter range.
    pub keep_alive: Option<KeepAliveConfig>,
}

impl BinanceConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms.unwrap_or(3_000))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(10_000))
    }

    /// Returns `(min, max)` delay between unsolicited pings (default: 5–10 s).
    pub fn keep_alive_range(&self) -> (Duration, Duration) {
        let ka = self.keep_alive.as_ref();
        let min = ka.and_then(|k| k.min_secs).unwrap_or(5);
        let max = ka.and_then(|k| k.max_secs).unwrap_or(10);
        (Duration::from_secs(min), Duration::from_secs(max))
    }

    /// Effective spot market config; a missing block means "enabled, default symbols".
    pub fn spot(&self) -> MarketConfig {
        self.spot.clone().unwrap_or_default()
    }

    pub fn perpetual(&self) -> MarketConfig {
        self.perpetual.clone().unwrap_or_default()
    }
}

/// Settings for one market's stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketConfig {
    /// Whether to open this stream (default: true).
    pub enabled: Option<bool>,

    /// Pairs to subscribe (e.g. `["BTCUSDT", "ETHUSDT"]`).
    pub symbols: Option<Vec<String>>,

    /// Endpoint override as a `ws://` or `wss://` URL (testnets, proxies).
    /// Scheme, host and port are taken from it; the path is always the
    /// combined stream of `symbols`.
    pub endpoint: Option<String>,
}

impl MarketConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Returns the configured pairs, upper-cased, or [`DEFAULT_SYMBOLS`].
    pub fn effective_symbols(&self) -> Vec<String> {
        match &self.symbols {
            Some(list) => list.iter().map(|s| s.to_uppercase()).collect(),
            None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parsed `endpoint`, if set.
    pub fn endpoint_options(&self) -> Result<Option<ConnectOptions>, AggError> {
        self.endpoint.as_deref().map(ConnectOptions::from_url).transpose()
    }
}

/// Keep-alive ping jitter bounds in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct KeepAliveConfig {
    pub min_secs: Option<u64>,
    pub max_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Alert rule configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertConfig {
    /// Trailing window length in seconds (default: 60).
    pub window_secs: Option<u64>,

    /// Qualifying trades per side needed for a window alert (default: 5).
    pub window_count: Option<usize>,

    /// Per-trade notional a trade must exceed to qualify, in millions (default: 1).
    pub notional_limit_millions: Option<f64>,

    /// Single-trade quantity limit per base currency (e.g. `{"BTC": 100}`).
    /// Currencies without an entry never raise single-trade alerts.
    pub qty_limits: Option<HashMap<String, f64>>,

    /// Period of the windowed check in seconds (default: 30).
    pub check_interval_secs: Option<u64>,

    /// Offset used for alert timestamps, hours east of UTC (default: 8).
    pub utc_offset_hours: Option<i32>,
}

impl AlertConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.unwrap_or(60))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.unwrap_or(30))
    }

    pub fn utc_offset_hours(&self) -> i32 {
        self.utc_offset_hours.unwrap_or(8)
    }

    /// Flatten into the threshold set consumed by the aggregator.
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            qty_limits: self
                .qty_limits
                .as_ref()
                .map(|m| m.iter().map(|(k, v)| (k.to_uppercase(), *v)).collect())
                .unwrap_or_default(),
            window_secs: self.window().as_secs(),
            window_count: self.window_count.unwrap_or(5),
            notional_limit_millions: self.notional_limit_millions.unwrap_or(1.0),
        }
    }
}

/// Thresholds the aggregation engine evaluates against.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    pub qty_limits: HashMap<String, f64>,
    pub window_secs: u64,
    pub window_count: usize,
    pub notional_limit_millions: f64,
}

impl AlertThresholds {
    /// Single-trade quantity limit for a base currency, if configured.
    pub fn qty_limit(&self, currency: &str) -> Option<f64> {
        self.qty_limits.get(currency).copied()
    }
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

/// Telegram bot delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub token: String,

    /// Destination chat or channel id.
    pub chat_id: String,

    /// API base URL (default: `https://api.telegram.org`).
    pub api_base: Option<String>,

    /// Maximum concurrent `sendMessage` requests (default: 10).
    pub max_in_flight: Option<usize>,
}

impl TelegramConfig {
    pub fn api_base(&self) -> String {
        self.api_base.clone().unwrap_or_else(|| "https://api.telegram.org".into())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.unwrap_or(10)
    }
}

/// Load, parse and validate a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
