//! Binance aggTrade monitor: streams in, alerts out.
//!
//! # Architecture
//!
//! ```text
//! Connector(spot) ──┐  KeepAlive<AggTradeHandler>   ┌── ingest thread ──► Stat::update ──► single alert ──┐
//!                   ├──── TradeEvent (unbounded) ───┤                                                    ├─► AlertDispatcher
//! Connector(perp) ──┘                               └── StatRegistry ◄── window check (every 30 s) ──────┘
//! ```
//!
//! The ingestion queue is unbounded: if aggregation falls behind, events pile
//! up in memory rather than slowing the sockets.

use std::sync::Arc;
use std::time::Duration;

use aggwatch_core::config::{AlertThresholds, AppConfig, BinanceConfig};
use aggwatch_core::error::AggError;
use aggwatch_core::scheduler::Scheduler;
use aggwatch_core::time_util;
use aggwatch_core::ws::{
    ConnectOptions, ConnectionStatus, Connector, ConnectorSettings, FrameHandler, KeepAlive, SocketHandle,
};
use aggwatch_core::{MarketType, TradeEvent};
use anyhow::{Context, Result};
use chrono::FixedOffset;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::aggregator::StatRegistry;
use crate::alert::AlertDispatcher;
use crate::binance::{self, agg_trade};

/// One market's endpoint.
#[derive(Debug, Clone)]
pub struct MarketStream {
    pub market: MarketType,
    pub options: ConnectOptions,
}

/// Enabled Binance markets, spot first.
pub fn market_streams(cfg: &BinanceConfig) -> Result<Vec<MarketStream>, AggError> {
    let mut streams = Vec::new();
    for (market, m) in [(MarketType::Spot, cfg.spot()), (MarketType::PerpetualFutures, cfg.perpetual())] {
        if let Some(options) = binance::connect_options(market, &m)? {
            streams.push(MarketStream { market, options });
        }
    }
    Ok(streams)
}

/// Timing and thresholds of a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub thresholds: AlertThresholds,
    pub check_interval: Duration,
    pub utc_offset: FixedOffset,
    pub monitor_interval: Duration,
    pub connect_timeout: Duration,
    /// Unsolicited ping delay bounds.
    pub keep_alive: (Duration, Duration),
}

impl MonitorSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let binance = cfg.binance();
        let alerts = cfg.alerts();
        Self {
            thresholds: alerts.thresholds(),
            check_interval: alerts.check_interval(),
            utc_offset: time_util::offset_hours(alerts.utc_offset_hours()),
            monitor_interval: binance.monitor_interval(),
            connect_timeout: binance.connect_timeout(),
            keep_alive: binance.keep_alive_range(),
        }
    }

    /// Reject settings no timer or rule can run with.
    pub fn validate(&self) -> Result<(), AggError> {
        if self.check_interval.is_zero() || self.monitor_interval.is_zero() || self.connect_timeout.is_zero() {
            return Err(AggError::Config(format!(
                "intervals must be > 0: check={:?} monitor={:?} connect_timeout={:?}",
                self.check_interval, self.monitor_interval, self.connect_timeout
            )));
        }
        let (min, max) = self.keep_alive;
        if min.is_zero() || min > max {
            return Err(AggError::Config(format!("keep-alive range invalid: min={min:?} max={max:?}")));
        }
        if self.thresholds.window_secs == 0 || self.thresholds.window_count == 0 {
            return Err(AggError::Config("window_secs and window_count must be > 0".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frame handler
// ---------------------------------------------------------------------------

/// Decodes aggTrade frames of one market and queues them for ingestion.
pub struct AggTradeHandler {
    market: MarketType,
    tx: Sender<TradeEvent>,
}

impl AggTradeHandler {
    pub fn new(market: MarketType, tx: Sender<TradeEvent>) -> Self {
        Self { market, tx }
    }

    /// Decode one text frame and queue the trade it carries, if any.
    pub fn handle_text(&self, text: &str) -> Result<()> {
        let Some(event) = agg_trade::decode_combined(text, self.market)? else {
            debug!("[{}] non-trade frame: {text}", self.market.tag());
            return Ok(());
        };
        if self.tx.send(event).is_err() {
            // Ingestion is gone: the monitor is shutting down.
            debug!("[{}] ingestion closed, trade dropped", self.market.tag());
        }
        Ok(())
    }
}

impl FrameHandler for AggTradeHandler {
    fn name(&self) -> &str {
        "aggTrade"
    }

    fn on_connect(&self, socket: &SocketHandle) -> Result<()> {
        info!("[{}] aggTrade stream up: {}", self.market.tag(), socket.url());
        Ok(())
    }

    fn on_text_message(&self, _socket: &SocketHandle, text: &str) -> Result<()> {
        self.handle_text(text)
    }

    fn on_closed(&self, socket: &SocketHandle) {
        info!("[{}] aggTrade socket {} closed", self.market.tag(), socket.id());
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Running monitor. Dropping it stops everything.
pub struct AggTradeMonitor {
    connectors: Vec<Connector>,
    checker: Scheduler,
    ingest_tx: Option<Sender<TradeEvent>>,
    registry: Arc<StatRegistry>,
}

impl AggTradeMonitor {
    /// Start from the application config. Must be called inside a Tokio runtime.
    pub fn start(cfg: &AppConfig, dispatcher: Arc<AlertDispatcher>) -> Result<Self> {
        cfg.validate()?;
        Self::start_with(market_streams(&cfg.binance())?, MonitorSettings::from_config(cfg), dispatcher)
    }

    /// Start against explicit endpoints.
    pub fn start_with(
        streams: Vec<MarketStream>,
        settings: MonitorSettings,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Result<Self> {
        if streams.is_empty() {
            return Err(AggError::Config("no Binance market enabled".into()).into());
        }
        settings.validate()?;

        let registry = Arc::new(StatRegistry::new(settings.thresholds.window_secs));
        let (tx, rx) = crossbeam_channel::unbounded::<TradeEvent>();

        {
            let registry = registry.clone();
            let dispatcher = dispatcher.clone();
            let thresholds = settings.thresholds.clone();
            let offset = settings.utc_offset;
            std::thread::Builder::new()
                .name("aggwatch-ingest".into())
                .spawn(move || run_ingest_loop(rx, registry, thresholds, offset, dispatcher))
                .context("spawn ingestion thread")?;
        }

        let checker = Scheduler::new("window-check");
        {
            let registry = registry.clone();
            let dispatcher = dispatcher.clone();
            let thresholds = settings.thresholds.clone();
            let offset = settings.utc_offset;
            checker.every(settings.check_interval, move || {
                run_window_check(&registry, &thresholds, offset, &dispatcher);
                async {}
            });
        }

        let (ka_min, ka_max) = settings.keep_alive;
        let connectors = streams
            .into_iter()
            .map(|s| {
                let handler = KeepAlive::with_interval(AggTradeHandler::new(s.market, tx.clone()), ka_min, ka_max);
                let mut cs = ConnectorSettings::new(format!("binance_{}", s.market.tag()));
                cs.monitor_interval = settings.monitor_interval;
                cs.connect_timeout = settings.connect_timeout;
                let connector = Connector::new(s.options, handler, cs);
                connector.reconnect();
                connector
            })
            .collect::<Vec<_>>();

        info!(
            "[monitor] started: {} stream(s), window={}s count={} notional>{}M, check every {:?}, alerts via {}",
            connectors.len(),
            settings.thresholds.window_secs,
            settings.thresholds.window_count,
            settings.thresholds.notional_limit_millions,
            settings.check_interval,
            dispatcher.sink_name()
        );

        Ok(Self { connectors, checker, ingest_tx: Some(tx), registry })
    }

    pub fn registry(&self) -> &Arc<StatRegistry> {
        &self.registry
    }

    /// `(label, status)` of every connector.
    pub fn statuses(&self) -> Vec<(String, ConnectionStatus)> {
        self.connectors.iter().map(|c| (c.context().label().to_string(), c.status())).collect()
    }

    /// Destroy the connectors, cancel the window check and close ingestion.
    pub fn stop(&mut self) {
        if self.ingest_tx.is_none() {
            return;
        }
        for connector in self.connectors.drain(..) {
            connector.destroy();
        }
        self.checker.cancel_all();
        // The ingestion thread exits once the handlers' senders are gone too.
        self.ingest_tx = None;
        info!("[monitor] stopped ({} stats tracked)", self.registry.len());
    }
}

impl Drop for AggTradeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single-trade rule, one event at a time, until every sender is dropped.
fn run_ingest_loop(
    rx: Receiver<TradeEvent>,
    registry: Arc<StatRegistry>,
    thresholds: AlertThresholds,
    offset: FixedOffset,
    dispatcher: Arc<AlertDispatcher>,
) {
    info!("[ingest] loop started");
    while let Ok(event) = rx.recv() {
        let stat = registry.get_or_create(event.market, &event.symbol);
        let limit = thresholds.qty_limit(stat.currency());
        let (price, quantity) = (event.price, event.quantity);
        if stat.update(event, thresholds.window_secs, limit) {
            info!("[ingest] single trade alert {} price={price} qty={quantity}", stat.key());
            if let Some(text) = stat.single_alert(offset) {
                dispatcher.dispatch(text);
            }
        }
    }
    info!("[ingest] loop exited");
}

/// Window rule over every tracked key.
fn run_window_check(
    registry: &StatRegistry,
    thresholds: &AlertThresholds,
    offset: FixedOffset,
    dispatcher: &AlertDispatcher,
) {
    let mut raised = 0usize;
    for stat in registry.snapshot() {
        let alerts = stat.duration_check(thresholds.notional_limit_millions, thresholds.window_count, offset);
        if !alerts.is_empty() {
            warn!("[window-check] {} crossed {} large trades in {}s", stat.key(), thresholds.window_count, thresholds.window_secs);
        }
        for text in alerts {
            dispatcher.dispatch(text);
            raised += 1;
        }
    }
    debug!("[window-check] {} key(s) checked, {raised} alert(s)", registry.len());
}
