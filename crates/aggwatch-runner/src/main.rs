//! # aggwatch-runner
//!
//! Main entry point: watches Binance aggTrade streams and posts large-trade
//! alerts to Telegram.
//!
//! Loads a JSON configuration file, starts the monitor and runs until Ctrl+C.
//! Without a `telegram` block (or with `--dry-run`) alerts are only logged.
//!
//! # Usage
//!
//! ```bash
//! aggwatch-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use aggwatch_md::AggTradeMonitor;
use aggwatch_md::alert::{AlertDispatcher, AlertSink, LogSink, TelegramSink};
use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

/// Binance large-trade monitor.
#[derive(Parser)]
#[command(name = "aggwatch-runner", about = "Binance aggTrade large-trade monitor")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output (overrides `app.log_path`).
    #[arg(long)]
    log_dir: Option<String>,

    /// Log alerts instead of sending them.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = aggwatch_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    aggwatch_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());

    info!("aggwatch-runner starting, config={}, log_level={}", cli.config.display(), cli.log_level);

    // 3. Alert delivery
    let (sink, channel_id, max_in_flight): (Arc<dyn AlertSink>, String, usize) = match &config.telegram {
        Some(tg) if !cli.dry_run => (Arc::new(TelegramSink::new(tg)?), tg.chat_id.clone(), tg.max_in_flight()),
        Some(tg) => (Arc::new(LogSink), tg.chat_id.clone(), tg.max_in_flight()),
        None => {
            warn!("no telegram config, alerts are only logged");
            (Arc::new(LogSink), "log".to_string(), 10)
        }
    };
    let dispatcher = Arc::new(AlertDispatcher::new(sink, channel_id, max_in_flight, tokio::runtime::Handle::current()));
    info!("alerts via {}", dispatcher.sink_name());

    // 4. Start the monitor
    let mut monitor = AggTradeMonitor::start(&config, dispatcher)?;
    info!("monitor started, press Ctrl+C to stop");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    for (label, status) in monitor.statuses() {
        info!("[{label}] final status {status}");
    }
    monitor.stop();

    info!("stopped, goodbye");
    Ok(())
}
