//! Per-stream connection state shared between a connector and its handler.
//!
//! The context is the only link from a [`FrameHandler`](super::FrameHandler)
//! back to its connector: handlers look up the current socket and status here
//! instead of holding a reference to the connector itself.

use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::client::SocketHandle;
use super::options::ConnectOptions;
use crate::scheduler::Scheduler;

/// Connector status. The numeric values are stable and used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ConnectionStatus {
    /// Initial state, and the state right after a remote close.
    Disabled = -1,
    /// Waiting for the next monitor tick to start an attempt.
    Disconnected = 0,
    /// An attempt is in flight.
    Connecting = 1,
    Connected = 2,
}

impl ConnectionStatus {
    fn from_i8(v: i8) -> Self {
        match v {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disabled,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        write!(f, "{s}({})", *self as i8)
    }
}

/// Status, live socket and timers of one logical stream.
pub struct ConnectionContext {
    label: String,
    options: ConnectOptions,
    status: AtomicI8,
    socket: Mutex<Option<SocketHandle>>,
    scheduler: Scheduler,
    next_socket_id: AtomicU64,
    destroyed: AtomicBool,
}

impl ConnectionContext {
    pub fn new(label: impl Into<String>, options: ConnectOptions) -> Self {
        let label = label.into();
        Self {
            scheduler: Scheduler::new(label.clone()),
            label,
            options,
            status: AtomicI8::new(ConnectionStatus::Disabled as i8),
            socket: Mutex::new(None),
            next_socket_id: AtomicU64::new(1),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_i8(self.status.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Timers owned by this stream; cancelled when the connector is destroyed.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The most recent socket, open or not.
    pub fn socket(&self) -> Option<SocketHandle> {
        self.socket.lock().clone()
    }

    /// The live socket, only while the status is `Connected`.
    pub fn connected_socket(&self) -> Option<SocketHandle> {
        if !self.is_connected() {
            return None;
        }
        self.socket().filter(|s| !s.is_closed())
    }

    /// Request a new connection attempt on the next monitor tick.
    ///
    /// Moves any state to `Disconnected`. Ignored once destroyed.
    pub fn reconnect(&self) {
        if self.is_destroyed() {
            return;
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Gate for the monitor tick: `Disconnected` → `Connecting`.
    ///
    /// Returns `false` (and changes nothing) from any other state, so at most
    /// one attempt can be in flight.
    pub(crate) fn begin_attempt(&self) -> bool {
        self.transition(ConnectionStatus::Disconnected, ConnectionStatus::Connecting)
    }

    /// `Connecting` → `Connected`, storing the new socket.
    ///
    /// Returns `false` if the attempt was superseded (status changed meanwhile);
    /// the caller must then drop the stream.
    pub(crate) fn mark_connected(&self, socket: SocketHandle) -> bool {
        let mut slot = self.socket.lock();
        if self.is_destroyed()
            || !self.transition(ConnectionStatus::Connecting, ConnectionStatus::Connected)
        {
            return false;
        }
        *slot = Some(socket);
        true
    }

    pub(crate) fn disable(&self) {
        self.set_status(ConnectionStatus::Disabled);
    }

    /// True if `socket` is the one currently stored.
    pub(crate) fn is_current(&self, socket: &SocketHandle) -> bool {
        self.socket.lock().as_ref().map(|s| s.id()) == Some(socket.id())
    }

    pub(crate) fn next_socket_id(&self) -> u64 {
        self.next_socket_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Terminal: cancel timers, close the live socket, refuse further attempts.
    pub(crate) fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.scheduler.cancel_all();
        self.set_status(ConnectionStatus::Disabled);
        if let Some(socket) = self.socket.lock().as_ref() {
            if !socket.is_closed() {
                socket.close();
            }
        }
    }

    fn set_status(&self, next: ConnectionStatus) {
        let prev = ConnectionStatus::from_i8(self.status.swap(next as i8, Ordering::AcqRel));
        if prev != next {
            debug!("[{}] status {prev} -> {next}", self.label);
        }
    }

    fn transition(&self, from: ConnectionStatus, to: ConnectionStatus) -> bool {
        let ok = self
            .status
            .compare_exchange(from as i8, to as i8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if ok {
            debug!("[{}] status {from} -> {to}", self.label);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn ctx() -> ConnectionContext {
        ConnectionContext::new("test", ConnectOptions::new("localhost", 1, "/", false))
    }

    #[test]
    fn starts_disabled_and_gate_needs_reconnect() {
        let c = ctx();
        assert_eq!(c.status(), ConnectionStatus::Disabled);
        assert!(!c.begin_attempt());

        c.reconnect();
        assert_eq!(c.status(), ConnectionStatus::Disconnected);
        assert!(c.begin_attempt());
        assert_eq!(c.status(), ConnectionStatus::Connecting);
        assert!(!c.begin_attempt(), "second attempt must be refused");
    }

    #[test]
    fn connected_only_through_connecting() {
        let c = ctx();
        let (sock, _driver) = SocketHandle::channel(c.next_socket_id(), "ws://localhost:1/");

        c.reconnect();
        assert!(!c.mark_connected(sock.clone()), "Disconnected cannot jump to Connected");
        assert!(c.socket().is_none());

        assert!(c.begin_attempt());
        assert!(c.mark_connected(sock.clone()));
        assert!(c.is_connected());
        assert!(c.is_current(&sock));
        assert_eq!(c.connected_socket().map(|s| s.id()), Some(sock.id()));
    }

    #[test]
    fn superseded_attempt_is_rejected() {
        let c = ctx();
        let (sock, _driver) = SocketHandle::channel(1, "ws://localhost:1/");
        c.reconnect();
        assert!(c.begin_attempt());
        c.reconnect();
        assert!(!c.mark_connected(sock));
        assert_eq!(c.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn concurrent_gate_admits_one() {
        let c = Arc::new(ctx());
        c.reconnect();
        let winners = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let c = c.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if c.begin_attempt() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_after_close_until_reconnect() {
        let c = ctx();
        let (sock, _driver) = SocketHandle::channel(c.next_socket_id(), "ws://localhost:1/");
        c.reconnect();
        assert!(c.begin_attempt());
        assert!(c.mark_connected(sock));

        c.disable();
        assert_eq!(c.status(), ConnectionStatus::Disabled);
        assert!(!c.begin_attempt(), "no attempt while disabled");

        c.reconnect();
        assert!(c.begin_attempt());
        assert_eq!(c.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn destroyed_ignores_reconnect() {
        let c = ctx();
        c.destroy();
        c.reconnect();
        assert_eq!(c.status(), ConnectionStatus::Disabled);
        assert!(!c.begin_attempt());
    }
}
