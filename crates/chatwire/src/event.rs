//! What the engine tells its caller.
//!
//! Two channels flow out of the engine:
//!
//! - **Events** ([`EngineEvent`]): connection lifecycle changes and
//!   server-pushed commands, delivered in order on an unbounded channel.
//! - **Replies** ([`Reply`]): the outcome of one `send_command` call,
//!   delivered through the [`PendingReply`] future it returned.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chatwire_correlator::{Completion, PendingHandle};
use chatwire_protocol::CommandType;
use tokio::sync::mpsc;

/// Receives [`EngineEvent`]s in the order they happened.
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Why the engine reported an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The socket failed, or could not be opened.
    Transport,
    /// No login response arrived before the auth deadline.
    AuthTimeout,
    /// The server stopped answering keepalive pings.
    KeepaliveTimeout,
    /// The engine could not write a frame it had to send (the login
    /// command).
    Send,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::AuthTimeout => "auth-timeout",
            ErrorKind::KeepaliveTimeout => "keepalive-timeout",
            ErrorKind::Send => "send",
        };
        f.write_str(name)
    }
}

/// A notification from the engine.
///
/// Lifecycle events follow the connection:
///
/// ```text
/// connect() ─→ Connected ─→ Authenticated ─→ … ─→ Disconnected
///                  │
///                  └─→ AuthenticationFailed ─→ Disconnected
/// ```
///
/// Every connection that got past `connect()` ends with exactly one
/// `Disconnected`, preceded by an `Error` or `AuthenticationFailed` when
/// the end was not asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The socket opened; the login command has been sent.
    Connected,
    /// Login succeeded.
    Authenticated {
        /// The session key the server issued.
        session_key: String,
    },
    /// The server rejected the login.
    AuthenticationFailed {
        /// Human-readable reason from the server's response.
        reason: String,
    },
    /// The server pushed a command that is not an acknowledgement of one
    /// of ours.
    CommandReceived {
        /// The command's type.
        command: CommandType,
        /// The command's raw JSON payload (empty if the frame had none).
        payload: String,
    },
    /// Something went wrong with the connection. Always followed by
    /// `Disconnected`.
    Error {
        /// What kind of failure.
        kind: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
    /// The connection is gone and the engine is back in `Closed`.
    Disconnected,
}

/// The outcome of one `send_command` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The server acknowledged the command; carries the acknowledgement's
    /// JSON payload.
    Acked(String),
    /// A command that gets no acknowledgement was written to the socket.
    Sent,
    /// No acknowledgement arrived before the timeout.
    TimedOut,
    /// The command was never sent, or the connection went away while it
    /// waited.
    Canceled,
}

impl Reply {
    /// The acknowledgement payload, if there was one.
    pub fn into_payload(self) -> Option<String> {
        match self {
            Reply::Acked(payload) => Some(payload),
            Reply::Sent | Reply::TimedOut | Reply::Canceled => None,
        }
    }

    /// Whether the command reached the server as far as the engine can
    /// tell (`Acked` or `Sent`).
    pub fn is_delivered(&self) -> bool {
        matches!(self, Reply::Acked(_) | Reply::Sent)
    }
}

impl From<Completion> for Reply {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Acked(payload) => Reply::Acked(payload),
            Completion::TimedOut => Reply::TimedOut,
            Completion::Canceled => Reply::Canceled,
        }
    }
}

#[derive(Debug)]
enum PendingInner {
    Ready(Option<Reply>),
    Waiting(PendingHandle),
}

/// Resolves to the [`Reply`] for one `send_command` call.
///
/// Commands that need no acknowledgement resolve immediately. Commands
/// that do resolve when the acknowledgement arrives, the timeout passes or
/// the connection is torn down, whichever happens first. The future never
/// hangs: if the engine is dropped it resolves to [`Reply::Canceled`].
#[derive(Debug)]
pub struct PendingReply {
    command: CommandType,
    inner: PendingInner,
}

impl PendingReply {
    pub(crate) fn ready(command: CommandType, reply: Reply) -> Self {
        Self {
            command,
            inner: PendingInner::Ready(Some(reply)),
        }
    }

    pub(crate) fn waiting(command: CommandType, handle: PendingHandle) -> Self {
        Self {
            command,
            inner: PendingInner::Waiting(handle),
        }
    }

    /// The command this reply is for.
    pub fn command(&self) -> CommandType {
        self.command
    }

    /// The `req_id` attached to the command, for commands that wait for an
    /// acknowledgement.
    pub fn request_id(&self) -> Option<&str> {
        match &self.inner {
            PendingInner::Waiting(handle) => Some(handle.request_id()),
            PendingInner::Ready(_) => None,
        }
    }
}

impl Future for PendingReply {
    type Output = Reply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            // Polling again after completion yields Canceled rather than
            // panicking.
            PendingInner::Ready(reply) => Poll::Ready(reply.take().unwrap_or(Reply::Canceled)),
            PendingInner::Waiting(handle) => Pin::new(handle).poll(cx).map(Reply::from),
        }
    }
}
