//! Endpoint descriptor for one logical stream.

use crate::error::AggError;

/// Where a connector connects to. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    host: String,
    port: u16,
    path: String,
    tls: bool,
}

impl ConnectOptions {
    /// `path` may include a query string; a missing leading `/` is added.
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>, tls: bool) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') { path } else { format!("/{path}") };
        Self { host: host.into(), port, path, tls }
    }

    /// Parse a `ws://` or `wss://` URL.
    pub fn from_url(raw: &str) -> Result<Self, AggError> {
        let url = url::Url::parse(raw).map_err(|e| AggError::Config(format!("bad url {raw}: {e}")))?;
        let tls = match url.scheme() {
            "wss" => true,
            "ws" => false,
            other => return Err(AggError::Config(format!("unsupported scheme {other} in {raw}"))),
        };
        let host = url.host_str().ok_or_else(|| AggError::Config(format!("missing host in {raw}")))?;
        let port = url.port_or_known_default().unwrap_or(if tls { 443 } else { 80 });
        let path = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        };
        Ok(Self::new(host, port, path, tls))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    /// Full URL, e.g. `wss://stream.binance.com:443/stream?streams=btcusdt@aggTrade`.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.path)
    }
}

impl std::fmt::Display for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.host, self.path)
    }
}
