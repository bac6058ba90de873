//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is always enabled. When a log directory is configured, a
//! second plain-text layer writes daily-rotated files via `tracing-appender`.
//! `RUST_LOG` takes precedence over the level passed in.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Call once at program start, before any connector is created, so that
/// dispatch-worker and ingestion threads inherit the subscriber.
///
/// - `log_level`: default filter if `RUST_LOG` is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `file_prefix`: log file prefix, usually the module name from config
pub fn init_logging(log_level: &str, log_dir: Option<&str>, file_prefix: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Handler callbacks run on named worker threads, so names beat ids here.
    let console_layer = fmt::layer().with_target(true).with_thread_names(true);

    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(tracing_appender::rolling::daily(dir, file_prefix))
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}
