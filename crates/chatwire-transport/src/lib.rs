//! Transport adapter layer for Chatwire.
//!
//! The protocol engine never touches a socket directly. It talks to a
//! [`Transport`]: something that can open a connection to a URL, write
//! text frames, and report whether it is open. Everything the socket has
//! to say (opened, closed, a frame arrived, something broke) is posted as
//! a [`TransportEvent`] into an [`Inbox`] that the engine drains on its
//! own logical thread.
//!
//! ```text
//! socket task ──post()──→ Inbox (mpsc) ──→ engine pump ──→ state machine
//! ```
//!
//! Because the socket may live on a different Tokio worker than the
//! engine, events are never applied where they are produced. They are
//! queued, and the engine applies them one at a time.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`
//! - `mock`: in-memory [`MockTransport`] for driving the engine in tests

mod error;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "mock")]
pub use mock::MockTransport;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::fmt;

use tokio::sync::mpsc;

/// Identifies one connection attempt.
///
/// Every call to [`Transport::connect`] gets a fresh id, and every event
/// the attempt produces carries it. The engine uses it to ignore late
/// events from a socket it has already torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something the socket reports to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket finished its opening handshake.
    Open,
    /// The socket was closed (by the peer or by the network).
    Closed,
    /// A text frame arrived.
    Message(String),
    /// The socket failed. The string is a human-readable description.
    Error(String),
}

/// An event tagged with the connection attempt that produced it.
pub type InboxItem = (ConnectionId, TransportEvent);

/// The receiving half of an inbox. Owned by the engine.
pub type InboxReceiver = mpsc::UnboundedReceiver<InboxItem>;

/// The posting half of the engine's transport queue, bound to one
/// connection attempt.
///
/// Cheap to clone. Posting never blocks, so it is safe to call from any
/// thread or task.
#[derive(Debug, Clone)]
pub struct Inbox {
    conn_id: ConnectionId,
    tx: mpsc::UnboundedSender<InboxItem>,
}

impl Inbox {
    /// Binds a sender to a connection attempt.
    pub fn new(conn_id: ConnectionId, tx: mpsc::UnboundedSender<InboxItem>) -> Self {
        Self { conn_id, tx }
    }

    /// The connection attempt this inbox posts for.
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Queues an event for the engine.
    ///
    /// Returns `false` if the engine is gone, in which case the caller
    /// should stop producing events.
    pub fn post(&self, event: TransportEvent) -> bool {
        self.tx.send((self.conn_id, event)).is_ok()
    }
}

/// The socket collaborator the engine drives.
///
/// Implementations own the raw connection. All methods are synchronous
/// and must not block: `connect` starts the work and reports the outcome
/// later through the inbox, `send` queues a frame for writing.
pub trait Transport: Send + 'static {
    /// Starts opening a connection to `url`.
    ///
    /// Any previous connection is dropped first. The outcome is reported
    /// by posting [`TransportEvent::Open`] or [`TransportEvent::Error`].
    fn connect(&mut self, url: &str, inbox: Inbox) -> Result<(), TransportError>;

    /// Closes the current connection, if any.
    ///
    /// An explicit disconnect does not post [`TransportEvent::Closed`];
    /// the caller already knows.
    fn disconnect(&mut self);

    /// Queues a text frame for sending.
    ///
    /// # Errors
    /// Returns [`TransportError::NotOpen`] when the socket is not open.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Whether the socket currently reports open.
    fn is_open(&self) -> bool;
}
