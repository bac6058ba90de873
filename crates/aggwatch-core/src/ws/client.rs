//! Live socket plumbing.
//!
//! A connected WebSocket is owned by a background I/O task (see
//! [`super::connector`]). Everything else talks to it through a cheap, clonable
//! [`SocketHandle`]: outbound frames go through an mpsc channel and the I/O task
//! publishes its termination on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::options::ConnectOptions;
use crate::error::AggError;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Command for the I/O task.
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(Message),
    Close,
}

/// Handle to one live socket.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    id: u64,
    url: Arc<str>,
    tx: mpsc::UnboundedSender<Outbound>,
    closed: watch::Receiver<bool>,
}

/// The I/O task's end of a [`SocketHandle`].
pub(crate) struct SocketDriver {
    pub(crate) outbound: mpsc::UnboundedReceiver<Outbound>,
    closed: watch::Sender<bool>,
}

impl SocketDriver {
    /// Mark the socket closed; wakes every [`SocketHandle::closed`] waiter.
    pub(crate) fn finish(&self) {
        self.closed.send_replace(true);
    }
}

impl SocketHandle {
    pub(crate) fn channel(id: u64, url: &str) -> (Self, SocketDriver) {
        let (tx, outbound) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        (
            Self { id, url: Arc::from(url), tx, closed: closed_rx },
            SocketDriver { outbound, closed: closed_tx },
        )
    }

    /// Connector-unique socket id, increasing with every successful connect.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn send_ping(&self, payload: Vec<u8>) -> Result<(), AggError> {
        self.send(Message::Ping(payload.into()))
    }

    pub fn send_pong(&self, payload: Vec<u8>) -> Result<(), AggError> {
        self.send(Message::Pong(payload.into()))
    }

    /// Ask the I/O task to send a close frame and stop. Idempotent.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the I/O task has stopped.
    pub async fn closed(&self) {
        let mut rx = self.closed.clone();
        // Err means the driver is gone, which also means closed.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn send(&self, msg: Message) -> Result<(), AggError> {
        if self.is_closed() {
            return Err(AggError::WebSocket(format!("socket {} is closed", self.id)));
        }
        self.tx
            .send(Outbound::Frame(msg))
            .map_err(|_| AggError::WebSocket(format!("socket {} I/O task gone", self.id)))
    }
}

/// Open a WebSocket (TLS when `options.tls()`), bounded by `timeout`.
pub(crate) async fn connect_ws(options: &ConnectOptions, timeout: Duration) -> Result<WsStream, AggError> {
    let url = options.url();
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(AggError::WebSocket(e.to_string())),
        Err(_) => Err(AggError::ConnectTimeout(timeout)),
    }
}
