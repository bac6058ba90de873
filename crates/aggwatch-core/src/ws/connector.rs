//! Resilient connector: keeps one WebSocket alive forever.
//!
//! ```text
//!            new()                 reconnect()            monitor tick
//!  ──► Disabled(-1) ─────────────► Disconnected(0) ─────────────► Connecting(1)
//!         ▲                               ▲                          │   │
//!         │ remote close                  │ before_connect / connect │   │ handshake ok
//!         │ (then reconnect())            └────────── failed ────────┘   ▼
//!         └─────────────────────────────────────────────────────── Connected(2)
//! ```
//!
//! Each `Connector` owns:
//! 1. A monitor task on the context's [`Scheduler`](crate::scheduler::Scheduler):
//!    every tick, if the status is `Disconnected`, it runs one connection attempt.
//! 2. One I/O task per live socket, forwarding frames and draining outbound
//!    commands.
//! 3. A dispatch worker on its own OS thread that runs every handler hook, so a
//!    slow handler never stalls socket I/O or another stream. Its queue is
//!    unbounded: a handler that cannot keep up grows memory, not latency upstream.
//!
//! Failures are never fatal: they are logged and retried on the next tick, with
//! no backoff and no retry ceiling.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::client::{self, Outbound, SocketDriver, SocketHandle, WsStream};
use super::context::{ConnectionContext, ConnectionStatus};
use super::handler::{ControlFrame, FrameHandler};
use super::options::ConnectOptions;

/// Default monitor tick.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(3_000);

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a monitor tick waits for a stale socket to finish closing.
const STALE_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connector timing.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Label used in logs and for the dispatch thread name.
    pub label: String,
    pub monitor_interval: Duration,
    pub connect_timeout: Duration,
}

impl ConnectorSettings {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Work item for the dispatch worker.
enum Dispatch {
    Connect(SocketHandle),
    Text(SocketHandle, String),
    Binary(SocketHandle, Vec<u8>),
    Frame(SocketHandle, ControlFrame),
    Closed(SocketHandle),
}

struct Inner {
    ctx: Arc<ConnectionContext>,
    handler: Arc<dyn FrameHandler>,
    dispatch: Sender<Dispatch>,
    connect_timeout: Duration,
}

/// Keeps one logical stream connected and feeds its frames to a handler.
///
/// A new connector is `Disabled`; call [`reconnect`](Self::reconnect) to request
/// the first attempt. Must be created inside a Tokio runtime.
pub struct Connector {
    inner: Arc<Inner>,
}

impl Connector {
    pub fn new<H: FrameHandler>(options: ConnectOptions, handler: H, settings: ConnectorSettings) -> Self {
        let ctx = Arc::new(ConnectionContext::new(settings.label.clone(), options));
        let handler: Arc<dyn FrameHandler> = Arc::new(handler);
        let (tx, rx) = crossbeam_channel::unbounded::<Dispatch>();

        let worker_handler = handler.clone();
        let worker_label = settings.label.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("{}-dispatch", settings.label))
            .spawn(move || run_dispatch_loop(&worker_label, worker_handler, rx));
        if let Err(e) = spawned {
            error!("[{}] failed to spawn dispatch worker: {e}", settings.label);
        }

        let inner = Arc::new(Inner { ctx: ctx.clone(), handler, dispatch: tx, connect_timeout: settings.connect_timeout });

        guarded(&settings.label, "on_init", || {
            inner.handler.on_init(&ctx);
            Ok(())
        });

        // Weak: the monitor task is owned by the context's scheduler.
        let weak = Arc::downgrade(&inner);
        ctx.scheduler().every(settings.monitor_interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.monitor_tick().await;
                }
            }
        });

        info!(
            "[{}] connector created for {} (handler={}, tick={:?})",
            settings.label,
            ctx.options(),
            inner.handler.name(),
            settings.monitor_interval
        );
        Self { inner }
    }

    /// Request a connection attempt on the next monitor tick.
    pub fn reconnect(&self) {
        self.inner.ctx.reconnect();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.ctx.status()
    }

    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.inner.ctx
    }

    /// Stop the monitor and keep-alive timers and close the live socket.
    /// Terminal: no further attempts are made.
    pub fn destroy(&self) {
        if self.inner.ctx.is_destroyed() {
            return;
        }
        info!("[{}] connector destroyed", self.inner.ctx.label());
        self.inner.ctx.destroy();
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl Inner {
    async fn monitor_tick(self: &Arc<Self>) {
        if !self.ctx.begin_attempt() {
            return;
        }
        if let Some(stale) = self.ctx.socket().filter(|s| !s.is_closed()) {
            debug!("[{}] closing stale socket {} before reconnecting", self.ctx.label(), stale.id());
            stale.close();
            if tokio::time::timeout(STALE_CLOSE_TIMEOUT, stale.closed()).await.is_err() {
                warn!("[{}] stale socket {} did not close in time", self.ctx.label(), stale.id());
            }
        }
        self.connect().await;
    }

    async fn connect(self: &Arc<Self>) {
        let label = self.ctx.label();

        let preflight = catch_unwind(AssertUnwindSafe(|| self.handler.before_connect(&self.ctx)));
        match preflight {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("[{label}] before_connect failed, will retry: {e:#}");
                self.ctx.reconnect();
                return;
            }
            Err(_) => {
                error!("[{label}] before_connect panicked, will retry");
                self.ctx.reconnect();
                return;
            }
        }

        let options = self.ctx.options();
        let stream = match client::connect_ws(options, self.connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                warn!("[{label}] {} connect to {options} failed, will retry: {e}", self.handler.name());
                self.ctx.reconnect();
                return;
            }
        };

        let (socket, driver) = SocketHandle::channel(self.ctx.next_socket_id(), &options.url());
        if !self.ctx.mark_connected(socket.clone()) {
            // Superseded by reconnect() or destroy(); dropping the stream closes it.
            debug!("[{label}] attempt superseded (status={}), dropping socket", self.ctx.status());
            return;
        }
        info!("[{label}] {} connected to {options} (socket {})", self.handler.name(), socket.id());

        // on_connect must be queued ahead of any frame the I/O task reads.
        self.send(Dispatch::Connect(socket.clone()));
        tokio::spawn(run_io(stream, driver, socket, self.clone()));
    }

    fn send(&self, item: Dispatch) {
        // Only fails once the dispatch worker is gone, i.e. during teardown.
        let _ = self.dispatch.send(item);
    }

    /// Remote close of the current socket: Disabled, notify, then Disconnected.
    fn on_remote_close(&self, socket: SocketHandle, reason: &str) {
        let label = self.ctx.label();
        if self.ctx.is_destroyed() || !self.ctx.is_current(&socket) {
            self.send(Dispatch::Closed(socket));
            return;
        }
        warn!("[{label}] {} socket {} closed: {reason}, link {}", self.handler.name(), socket.id(), self.ctx.options());
        self.ctx.disable();
        self.send(Dispatch::Closed(socket));
        self.ctx.reconnect();
    }
}

/// Pump one socket until either side closes it.
async fn run_io(stream: WsStream, mut driver: SocketDriver, socket: SocketHandle, inner: Arc<Inner>) {
    let label = inner.ctx.label().to_string();
    let (mut ws_write, mut ws_read) = stream.split();

    let remote_reason = loop {
        tokio::select! {
            cmd = driver.outbound.recv() => match cmd {
                Some(Outbound::Frame(msg)) => {
                    if let Err(e) = ws_write.send(msg).await {
                        break Some(format!("send error: {e}"));
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = ws_write.close().await;
                    break None;
                }
            },

            msg = ws_read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    inner.send(Dispatch::Text(socket.clone(), text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    inner.send(Dispatch::Binary(socket.clone(), data.to_vec()));
                }
                Some(Ok(Message::Ping(data))) => {
                    inner.send(Dispatch::Frame(socket.clone(), ControlFrame::Ping(data.to_vec())));
                }
                Some(Ok(Message::Pong(data))) => {
                    inner.send(Dispatch::Frame(socket.clone(), ControlFrame::Pong(data.to_vec())));
                }
                Some(Ok(Message::Close(frame))) => {
                    break Some(match frame {
                        Some(f) => format!("close frame {} {}", f.code, f.reason.as_str()),
                        None => "close frame".to_string(),
                    });
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => break Some(format!("read error: {e}")),
                None => break Some("stream ended".to_string()),
            },
        }
    };

    driver.finish();
    match remote_reason {
        Some(reason) => inner.on_remote_close(socket, &reason),
        None => {
            debug!("[{label}] socket {} closed locally", socket.id());
            inner.send(Dispatch::Closed(socket));
        }
    }
}

/// Run handler hooks in arrival order until every sender is dropped.
fn run_dispatch_loop(label: &str, handler: Arc<dyn FrameHandler>, rx: Receiver<Dispatch>) {
    debug!("[{label}] dispatch worker started");
    while let Ok(item) = rx.recv() {
        match item {
            Dispatch::Connect(socket) => {
                guarded(label, "on_connect", || handler.on_connect(&socket));
            }
            Dispatch::Text(socket, text) => {
                let ok = guarded(label, "on_text_message", || handler.on_text_message(&socket, &text));
                if !ok {
                    debug!("[{label}] offending text frame: {text}");
                }
            }
            Dispatch::Binary(socket, bytes) => {
                guarded(label, "on_binary_message", || handler.on_binary_message(&socket, &bytes));
            }
            Dispatch::Frame(socket, frame) => {
                guarded(label, "on_frame", || handler.on_frame(&socket, &frame));
            }
            Dispatch::Closed(socket) => {
                guarded(label, "on_closed", || {
                    handler.on_closed(&socket);
                    Ok(())
                });
            }
        }
    }
    debug!("[{label}] dispatch worker exited");
}

/// Run one hook, logging an error or panic. Returns `true` on success.
fn guarded(label: &str, hook: &str, f: impl FnOnce() -> anyhow::Result<()>) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("[{label}] {hook} failed: {e:#}");
            false
        }
        Err(_) => {
            error!("[{label}] {hook} panicked");
            false
        }
    }
}
