//! Socket-facing half of a peer: framing, liveness and disposal.

use axum::extract::ws::{close_code, CloseFrame};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc, OnceLock,
    },
    time::Duration,
};
use tokio::{sync::mpsc, task::AbortHandle};

use switchboard_protocol::{Frame, NetworkEvent};

/// Liveness check period.
pub(crate) const HEARTBEAT_INTERVAL: Duration =
    Duration::from_secs(30);

/// How long a disposed socket may take to finish closing before the
/// reader is torn down.
pub(crate) const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Commands consumed by a connection's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Encode and send a frame as a binary message.
    Frame(Frame),
    /// Send a transport level ping.
    Ping,
    /// Send a close frame and stop writing.
    Close(Option<CloseFrame<'static>>),
}

/// Handle to one client socket.
///
/// The write half sits behind an unbounded channel so sends from the
/// pool never block; a writer task drains the channel and feeds the
/// sink. Cloning the handle shares the underlying socket.
#[derive(Clone)]
pub(crate) struct Connection {
    tx: mpsc::UnboundedSender<Outbound>,
    disposed: Arc<AtomicBool>,
    pong_received: Arc<AtomicBool>,
    remote_version: Arc<AtomicU8>,
    reader: Arc<OnceLock<AbortHandle>>,
    heartbeat: Arc<OnceLock<AbortHandle>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field(
                "disposed",
                &self.disposed.load(Ordering::SeqCst),
            )
            .field(
                "remote_version",
                &self.remote_version.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl Connection {
    /// Create a connection handle over a writer channel.
    pub(crate) fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            tx,
            disposed: Arc::new(AtomicBool::new(false)),
            // The first heartbeat tick fires immediately and must
            // not count as a missed pong.
            pong_received: Arc::new(AtomicBool::new(true)),
            remote_version: Arc::new(AtomicU8::new(0)),
            reader: Arc::new(OnceLock::new()),
            heartbeat: Arc::new(OnceLock::new()),
        }
    }

    /// Send a frame to the client.
    ///
    /// A no-op when the socket has already gone away.
    pub(crate) fn send_frame(&self, frame: Frame) {
        if self.tx.send(Outbound::Frame(frame)).is_err() {
            tracing::warn!("socket closed, dropping outbound frame");
        }
    }

    /// Send an event to the client.
    pub(crate) fn send_event(&self, event: NetworkEvent) {
        self.send_frame(Frame::Event(event));
    }

    /// Send a transport level ping.
    pub(crate) fn send_ping(&self) {
        let _ = self.tx.send(Outbound::Ping);
    }

    /// Record a transport level pong.
    pub(crate) fn mark_pong(&self) {
        self.pong_received.store(true, Ordering::SeqCst);
    }

    /// Clear the pong flag, returning whether a pong arrived since
    /// the previous call.
    pub(crate) fn take_pong(&self) -> bool {
        self.pong_received.swap(false, Ordering::SeqCst)
    }

    /// Record the protocol version announced by the client.
    pub(crate) fn record_remote_version(&self, version: u8) {
        self.remote_version.store(version, Ordering::SeqCst);
    }

    /// Whether the connection was disposed.
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Attach the reader task so disposal can tear it down.
    pub(crate) fn set_reader(&self, handle: AbortHandle) {
        let _ = self.reader.set(handle);
    }

    /// Attach the heartbeat task so disposal can stop it.
    pub(crate) fn set_heartbeat(&self, handle: AbortHandle) {
        let _ = self.heartbeat.set(handle);
    }

    /// Release the socket.
    ///
    /// Idempotent. Stops the heartbeat, requests a graceful close
    /// and tears the reader down if the transport has not finished
    /// closing after [CLOSE_GRACE].
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(heartbeat) = self.heartbeat.get() {
            heartbeat.abort();
        }
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        };
        let _ = self.tx.send(Outbound::Close(Some(frame)));
        if let Some(reader) = self.reader.get() {
            let reader = reader.clone();
            tokio::spawn(async move {
                tokio::time::sleep(CLOSE_GRACE).await;
                reader.abort();
            });
        }
    }
}
