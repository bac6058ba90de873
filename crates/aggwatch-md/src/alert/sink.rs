//! Alert delivery backends.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use aggwatch_core::config::TelegramConfig;
use aggwatch_core::error::AggError;

/// Outcome reported by a sink. Mirrors the Bot API reply `{ok, description?}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SinkResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl SinkResponse {
    pub fn ok() -> Self {
        Self { ok: true, description: None }
    }

    pub fn rejected(description: impl Into<String>) -> Self {
        Self { ok: false, description: Some(description.into()) }
    }
}

/// Somewhere alert text can be delivered to.
///
/// `Err` means the request never produced a reply (transport failure);
/// a reply with `ok == false` means the backend refused the message.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn deliver(&self, channel_id: &str, text: &str) -> Result<SinkResponse>;
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

const TELEGRAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API `sendMessage` with Markdown parsing and link previews off.
pub struct TelegramSink {
    http: reqwest::Client,
    /// `{api_base}/bot{token}/sendMessage`; never logged.
    endpoint: String,
}

impl TelegramSink {
    pub fn new(cfg: &TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TELEGRAM_TIMEOUT)
            .build()
            .map_err(|e| AggError::Alert(format!("http client: {e}")))?;
        let endpoint = format!("{}/bot{}/sendMessage", cfg.api_base().trim_end_matches('/'), cfg.token);
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, channel_id: &str, text: &str) -> Result<SinkResponse> {
        let body = serde_json::json!({
            "chat_id": channel_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_notification": false,
            "link_preview_options": { "is_disabled": true },
        });
        // The URL carries the bot token, so strip it from transport errors.
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AggError::Alert(e.without_url().to_string()))?;
        let status = resp.status();
        // Error replies (400, 429...) still carry a JSON body with `description`.
        match resp.json::<SinkResponse>().await {
            Ok(reply) => Ok(reply),
            Err(e) => Ok(SinkResponse::rejected(format!("HTTP {status}: {}", e.without_url()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Log only
// ---------------------------------------------------------------------------

/// Writes alerts to the log instead of sending them (dry run).
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, channel_id: &str, text: &str) -> Result<SinkResponse> {
        info!("[alert] -> {channel_id}\n{text}");
        Ok(SinkResponse::ok())
    }
}
