//! Frame handler protocol.
//!
//! A [`FrameHandler`] is the consumer side of a [`Connector`](super::Connector).
//! Every hook has a no-op default, so a concrete handler only overrides what it
//! needs. Frame hooks run on the connector's dispatch worker, never on the
//! socket I/O task; an `Err` or panic is logged for that one frame and does not
//! touch the connection.
//!
//! [`KeepAlive`] wraps any handler with ping/pong keep-alive.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use super::client::SocketHandle;
use super::context::ConnectionContext;

/// Control frame delivered to [`FrameHandler::on_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Ping(Vec<u8>),
    Pong(Vec<u8>),
}

impl ControlFrame {
    pub fn is_ping(&self) -> bool {
        matches!(self, Self::Ping(_))
    }
}

/// Capability set of a stream consumer.
pub trait FrameHandler: Send + Sync + 'static {
    /// Name used in connector log lines.
    fn name(&self) -> &str {
        "handler"
    }

    /// Called once when the connector is built, while the status is `Disabled`.
    /// The place to register timers on `ctx.scheduler()`.
    fn on_init(&self, _ctx: &Arc<ConnectionContext>) {}

    /// Called before every connection attempt. An `Err` aborts the attempt,
    /// which is retried on the next monitor tick.
    fn before_connect(&self, _ctx: &ConnectionContext) -> Result<()> {
        Ok(())
    }

    fn on_connect(&self, _socket: &SocketHandle) -> Result<()> {
        Ok(())
    }

    fn on_text_message(&self, _socket: &SocketHandle, _text: &str) -> Result<()> {
        Ok(())
    }

    fn on_binary_message(&self, _socket: &SocketHandle, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn on_closed(&self, _socket: &SocketHandle) {}

    fn on_frame(&self, _socket: &SocketHandle, _frame: &ControlFrame) -> Result<()> {
        Ok(())
    }
}

/// Handler that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl FrameHandler for NoopHandler {
    fn name(&self) -> &str {
        "noop"
    }
}

/// Default bounds of the unsolicited ping delay.
pub const KEEP_ALIVE_MIN: Duration = Duration::from_secs(5);
pub const KEEP_ALIVE_MAX: Duration = Duration::from_secs(10);

/// Keep-alive decorator.
///
/// - Answers every ping frame with a pong carrying the same payload.
/// - From `on_init`, schedules an unsolicited ping after a random delay in
///   `[min, max]`, repeating for the life of the connector. A ping is only sent
///   while the stream is `Connected`; it surfaces dead peers that TCP alone
///   would not report.
pub struct KeepAlive<H> {
    inner: H,
    min: Duration,
    max: Duration,
}

impl<H: FrameHandler> KeepAlive<H> {
    pub fn new(inner: H) -> Self {
        Self::with_interval(inner, KEEP_ALIVE_MIN, KEEP_ALIVE_MAX)
    }

    pub fn with_interval(inner: H, min: Duration, max: Duration) -> Self {
        Self { inner, min, max: max.max(min) }
    }
}

impl<H: FrameHandler> FrameHandler for KeepAlive<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn on_init(&self, ctx: &Arc<ConnectionContext>) {
        // Weak: the scheduler lives inside the context.
        let weak = Arc::downgrade(ctx);
        ctx.scheduler().every_jittered(self.min, self.max, move || {
            let weak = weak.clone();
            async move {
                let Some(ctx) = weak.upgrade() else { return };
                if let Some(socket) = ctx.connected_socket() {
                    match socket.send_ping(Vec::new()) {
                        Ok(()) => debug!("[{}] keep-alive ping sent", ctx.label()),
                        Err(e) => debug!("[{}] keep-alive ping failed: {e}", ctx.label()),
                    }
                }
            }
        });
        self.inner.on_init(ctx);
    }

    fn before_connect(&self, ctx: &ConnectionContext) -> Result<()> {
        self.inner.before_connect(ctx)
    }

    fn on_connect(&self, socket: &SocketHandle) -> Result<()> {
        self.inner.on_connect(socket)
    }

    fn on_text_message(&self, socket: &SocketHandle, text: &str) -> Result<()> {
        self.inner.on_text_message(socket, text)
    }

    fn on_binary_message(&self, socket: &SocketHandle, bytes: &[u8]) -> Result<()> {
        self.inner.on_binary_message(socket, bytes)
    }

    fn on_closed(&self, socket: &SocketHandle) {
        self.inner.on_closed(socket)
    }

    fn on_frame(&self, socket: &SocketHandle, frame: &ControlFrame) -> Result<()> {
        if let ControlFrame::Ping(data) = frame {
            // A pong on a closing socket is not worth reporting.
            if socket.send_pong(data.clone()).is_ok() {
                debug!("received ping, sent pong ({} bytes)", data.len());
            }
        }
        self.inner.on_frame(socket, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::client::Outbound;
    use crate::ws::options::ConnectOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_tungstenite::tungstenite::Message;

    #[derive(Default)]
    struct Counting {
        frames: AtomicUsize,
        inits: AtomicUsize,
    }

    impl FrameHandler for Arc<Counting> {
        fn on_init(&self, _ctx: &Arc<ConnectionContext>) {
            self.inits.fetch_add(1, Ordering::SeqCst);
        }

        fn on_frame(&self, _socket: &SocketHandle, _frame: &ControlFrame) -> Result<()> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn ping_is_answered_and_forwarded() {
        let counting = Arc::new(Counting::default());
        let handler = KeepAlive::new(counting.clone());
        let (socket, mut driver) = SocketHandle::channel(1, "ws://localhost:1/");

        handler.on_frame(&socket, &ControlFrame::Ping(b"abc".to_vec())).unwrap();
        handler.on_frame(&socket, &ControlFrame::Pong(Vec::new())).unwrap();

        match driver.outbound.recv().await {
            Some(Outbound::Frame(Message::Pong(p))) => assert_eq!(p.as_ref(), b"abc"),
            other => panic!("expected pong, got {other:?}"),
        }
        assert!(driver.outbound.try_recv().is_err(), "pong frames are not answered");
        assert_eq!(counting.frames.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unsolicited_ping_only_when_connected() {
        let ctx = Arc::new(ConnectionContext::new("ka", ConnectOptions::new("localhost", 1, "/", false)));
        let counting = Arc::new(Counting::default());
        let handler = KeepAlive::with_interval(
            counting.clone(),
            Duration::from_millis(50),
            Duration::from_millis(100),
        );
        handler.on_init(&ctx);
        assert_eq!(counting.inits.load(Ordering::SeqCst), 1);

        let (socket, mut driver) = SocketHandle::channel(ctx.next_socket_id(), "ws://localhost:1/");

        // Disabled: no ping goes out.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(driver.outbound.try_recv().is_err());

        ctx.reconnect();
        assert!(ctx.begin_attempt());
        assert!(ctx.mark_connected(socket));

        tokio::time::sleep(Duration::from_millis(250)).await;
        match driver.outbound.try_recv() {
            Ok(Outbound::Frame(Message::Ping(p))) => assert!(p.is_empty()),
            other => panic!("expected ping, got {other:?}"),
        }

        ctx.destroy();
    }
}
