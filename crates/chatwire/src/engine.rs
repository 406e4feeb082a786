//! The protocol engine.
//!
//! [`ProtocolEngine`] owns one connection and everything attached to it:
//! the transport, the state machine, the login handshake, the table of
//! requests waiting for acknowledgements, and the keepalive.
//!
//! # Single logical thread
//!
//! Sockets and timers produce work from wherever they run, but none of it
//! touches engine state directly. It is queued:
//!
//! ```text
//!   transport task ──(ConnectionId, TransportEvent)──┐
//!   request timers ──expired req_id──────────────────┤
//!   auth deadline  ──attempt number──────────────────┼──→ poll() / pump()
//!   keepalive      ──deadline reached────────────────┘         │
//!                                                              ▼
//!                                                  apply(): one input at a time
//! ```
//!
//! and applied one input at a time by [`poll`](ProtocolEngine::poll) or
//! [`pump`](ProtocolEngine::pump). Public methods take `&mut self`, so the
//! borrow checker guarantees the same for caller operations. Run it
//! yourself, or hand it to [`spawn`](ProtocolEngine::spawn) and talk to it
//! through an [`EngineHandle`](crate::EngineHandle).
//!
//! # Inbound routing
//!
//! Every frame goes to exactly one place:
//!
//! 1. `LOGI` → the login handshake (never the request table)
//! 2. a `req_id` that matches a pending request → that request's reply
//! 3. any other known command → [`EngineEvent::CommandReceived`]
//! 4. an unknown tag → dropped, logged at debug
//!
//! # Stale inputs
//!
//! Each `connect()` starts a new attempt with a fresh [`ConnectionId`].
//! Transport events and auth deadlines from an older attempt are ignored,
//! so a socket that dies after being replaced cannot tear down its
//! successor.

use std::time::Duration;

use chatwire_correlator::{ExpiredReceiver, RequestCorrelator, RequestIdGenerator};
use chatwire_protocol::{CommandType, Frame, encode};
use chatwire_session::{
    AuthHandshake, AuthOutcome, ConnectConfig, ConnectionState, ConnectionStateMachine,
};
use chatwire_transport::{
    ConnectionId, Inbox, InboxItem, InboxReceiver, Transport, TransportError, TransportEvent,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::keepalive::{Keepalive, KeepaliveDue};
use crate::{ChatwireError, EngineConfig, EngineEvent, ErrorKind, EventReceiver, PendingReply, Reply};

/// One unit of queued work.
#[derive(Debug)]
pub(crate) enum EngineInput {
    Transport(ConnectionId, TransportEvent),
    RequestExpired(String),
    AuthDeadline(u64),
    Keepalive(KeepaliveDue),
}

/// How a connection ended.
#[derive(Debug)]
enum Teardown {
    /// The caller asked.
    Requested,
    /// The server closed the socket.
    RemoteClosed,
    /// The server rejected the login (already reported).
    Rejected,
    /// Something failed; reported as an error first.
    Failed(ErrorKind, String),
}

/// Client-side engine for the WebSocket command protocol.
///
/// Generic over its [`Transport`] so tests can drive it with an in-memory
/// socket.
pub struct ProtocolEngine<T: Transport> {
    config: EngineConfig,
    transport: T,
    state: ConnectionStateMachine,
    handshake: AuthHandshake,
    correlator: RequestCorrelator,
    request_ids: RequestIdGenerator,
    keepalive: Keepalive,

    /// The attempt whose events are live; `None` while closed.
    current: Option<ConnectionId>,
    last_conn_id: ConnectionId,
    connect_config: Option<ConnectConfig>,

    inbox_tx: mpsc::UnboundedSender<InboxItem>,
    inbox_rx: InboxReceiver,
    expired_rx: ExpiredReceiver,
    deadline_tx: mpsc::UnboundedSender<u64>,
    deadline_rx: mpsc::UnboundedReceiver<u64>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl<T: Transport> ProtocolEngine<T> {
    /// Creates an engine in `Closed`, together with the receiver for its
    /// events.
    pub fn new(config: EngineConfig, transport: T) -> (Self, EventReceiver) {
        let config = config.validated();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (deadline_tx, deadline_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (correlator, expired_rx) = RequestCorrelator::channel();

        let engine = Self {
            handshake: AuthHandshake::new(config.auth_timeout),
            config,
            transport,
            state: ConnectionStateMachine::new(),
            correlator,
            request_ids: RequestIdGenerator::new(),
            keepalive: Keepalive::default(),
            current: None,
            last_conn_id: ConnectionId::new(0),
            connect_config: None,
            inbox_tx,
            inbox_rx,
            expired_rx,
            deadline_tx,
            deadline_rx,
            events,
        };
        (engine, events_rx)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    /// The session key, present only while authenticated.
    pub fn session_key(&self) -> Option<&str> {
        self.state.session_key()
    }

    /// Whether login has succeeded on the current connection.
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// How many commands are waiting for an acknowledgement.
    pub fn pending_requests(&self) -> usize {
        self.correlator.len()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Caller operations
    // -----------------------------------------------------------------------

    /// Starts connecting.
    ///
    /// Validates `config`, opens the socket, and arms the auth deadline,
    /// which covers both opening the socket and the login exchange. The
    /// login command goes out as soon as the socket reports open.
    ///
    /// # Errors
    /// - [`SessionError::InvalidConfig`](chatwire_session::SessionError::InvalidConfig)
    ///   for a missing app or user id
    /// - [`SessionError::AlreadyActive`](chatwire_session::SessionError::AlreadyActive)
    ///   if a connection is in flight or up (nothing changes)
    /// - a transport error if the socket could not even be started
    pub fn connect(&mut self, config: ConnectConfig) -> Result<(), ChatwireError> {
        if self.state().is_active() {
            tracing::warn!(state = %self.state(), "connect ignored: connection already active");
        }
        self.state.begin_connect()?;

        let url = match config.build_url(&self.config.client) {
            Ok(url) => url,
            Err(e) => {
                // Never left Closed as far as anyone outside can tell.
                self.state.reset();
                return Err(e.into());
            }
        };

        let conn_id = self.last_conn_id.next();
        self.last_conn_id = conn_id;
        self.current = Some(conn_id);
        self.handshake
            .arm(conn_id.into_inner(), self.deadline_tx.clone());

        tracing::info!(%conn_id, user_id = %config.user_id, "connecting");
        let inbox = Inbox::new(conn_id, self.inbox_tx.clone());
        if let Err(e) = self.transport.connect(&url, inbox) {
            tracing::warn!(%conn_id, error = %e, "transport refused to connect");
            self.handshake.disarm();
            self.current = None;
            self.state.reset();
            return Err(e.into());
        }

        self.connect_config = Some(config);
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Pending requests resolve as [`Reply::Canceled`] and a
    /// [`EngineEvent::Disconnected`] is emitted. A no-op when already
    /// closed.
    pub fn disconnect(&mut self) {
        if self.state() == ConnectionState::Closed {
            tracing::debug!("disconnect ignored: already closed");
            return;
        }
        self.teardown(Teardown::Requested);
    }

    /// Sends a command.
    ///
    /// For commands the server acknowledges, a `req_id` is attached and
    /// the command is registered before it is written, so an instant
    /// acknowledgement cannot be missed. The returned [`PendingReply`]
    /// resolves when the acknowledgement arrives, after `timeout` (the
    /// configured default when `None`), or when the connection goes away.
    ///
    /// Other commands are written as-is and resolve at once.
    ///
    /// A closed socket or failed write is not an error: the reply
    /// resolves to [`Reply::Canceled`].
    ///
    /// # Errors
    /// - [`ChatwireError::ReservedCommand`] for `LOGI`
    /// - a protocol error for the sentinel type or a non-object payload
    pub fn send_command<P>(
        &mut self,
        command: CommandType,
        payload: &P,
        timeout: Option<Duration>,
    ) -> Result<PendingReply, ChatwireError>
    where
        P: Serialize + ?Sized,
    {
        if command == CommandType::Login {
            return Err(ChatwireError::ReservedCommand(command));
        }

        if !command.requires_ack() {
            let frame = encode(command, payload, None)?;
            let reply = match self.write(&frame) {
                Ok(()) => {
                    tracing::trace!(%command, "command sent");
                    Reply::Sent
                }
                Err(e) => {
                    tracing::warn!(%command, error = %e, "send failed");
                    Reply::Canceled
                }
            };
            return Ok(PendingReply::ready(command, reply));
        }

        let request_id = self.request_ids.next_id();
        let frame = encode(command, payload, Some(&request_id))?;
        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let handle = self.correlator.register(&request_id, timeout)?;

        match self.write(&frame) {
            Ok(()) => tracing::debug!(%command, %request_id, ?timeout, "command sent, awaiting ack"),
            Err(e) => {
                tracing::warn!(%command, %request_id, error = %e, "send failed, canceling request");
                self.correlator.cancel_one(&request_id);
            }
        }
        Ok(PendingReply::waiting(command, handle))
    }

    fn write(&mut self, frame: &str) -> Result<(), TransportError> {
        if !self.transport.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.transport.send(frame)
    }

    // -----------------------------------------------------------------------
    // Driving the engine
    // -----------------------------------------------------------------------

    /// Applies every input that is already waiting, without waiting for
    /// more. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Some(input) = self.try_next_input() {
            self.apply(input);
            applied += 1;
        }
        applied
    }

    /// Waits for the next input and applies it.
    pub async fn pump(&mut self) {
        let input = self.next_input().await;
        self.apply(input);
    }

    fn try_next_input(&mut self) -> Option<EngineInput> {
        if let Ok((conn_id, event)) = self.inbox_rx.try_recv() {
            return Some(EngineInput::Transport(conn_id, event));
        }
        if let Ok(request_id) = self.expired_rx.try_recv() {
            return Some(EngineInput::RequestExpired(request_id));
        }
        if let Ok(attempt) = self.deadline_rx.try_recv() {
            return Some(EngineInput::AuthDeadline(attempt));
        }
        self.keepalive
            .due(Instant::now())
            .map(EngineInput::Keepalive)
    }

    /// Waits for the next input. Cancel-safe: nothing is lost if the
    /// future is dropped before it resolves.
    pub(crate) async fn next_input(&mut self) -> EngineInput {
        // Transport first: a frame that arrived alongside a deadline should
        // be seen before the deadline is judged.
        tokio::select! {
            biased;
            Some((conn_id, event)) = self.inbox_rx.recv() => EngineInput::Transport(conn_id, event),
            Some(request_id) = self.expired_rx.recv() => EngineInput::RequestExpired(request_id),
            Some(attempt) = self.deadline_rx.recv() => EngineInput::AuthDeadline(attempt),
            due = self.keepalive.wait() => EngineInput::Keepalive(due),
        }
    }

    pub(crate) fn apply(&mut self, input: EngineInput) {
        match input {
            EngineInput::Transport(conn_id, event) => self.on_transport(conn_id, event),
            EngineInput::RequestExpired(request_id) => {
                self.correlator.timeout_one(&request_id);
            }
            EngineInput::AuthDeadline(attempt) => self.on_auth_deadline(attempt),
            EngineInput::Keepalive(due) => self.on_keepalive(due),
        }
    }

    // -----------------------------------------------------------------------
    // Input handlers
    // -----------------------------------------------------------------------

    fn on_transport(&mut self, conn_id: ConnectionId, event: TransportEvent) {
        if self.current != Some(conn_id) {
            tracing::debug!(%conn_id, ?event, "dropping event from stale connection");
            return;
        }

        match event {
            TransportEvent::Open => self.on_open(conn_id),
            TransportEvent::Message(text) => self.on_frame(&text),
            TransportEvent::Closed => {
                tracing::info!(%conn_id, "connection closed by server");
                self.teardown(Teardown::RemoteClosed);
            }
            TransportEvent::Error(message) => {
                tracing::warn!(%conn_id, error = %message, "transport error");
                self.teardown(Teardown::Failed(ErrorKind::Transport, message));
            }
        }
    }

    fn on_open(&mut self, conn_id: ConnectionId) {
        if let Err(e) = self.state.on_open() {
            tracing::warn!(%conn_id, error = %e, "unexpected open");
            return;
        }
        tracing::info!(%conn_id, "socket open, logging in");
        self.emit(EngineEvent::Connected);

        let frame = match &self.connect_config {
            Some(config) => self.handshake.login_frame(config).map_err(|e| e.to_string()),
            None => Err("no connection config".to_string()),
        };
        let sent = frame.and_then(|frame| self.write(&frame).map_err(|e| e.to_string()));
        if let Err(message) = sent {
            tracing::warn!(%conn_id, error = %message, "could not send login");
            self.teardown(Teardown::Failed(ErrorKind::Send, message));
        }
    }

    fn on_frame(&mut self, text: &str) {
        // Any frame is a sign of life, even one we cannot route.
        self.keepalive.on_inbound();

        let frame = Frame::decode(text);
        if frame.command.is_none() {
            tracing::debug!(frame = %text, "dropping frame with unknown command");
            return;
        }

        if frame.command == CommandType::Login {
            self.on_login(text);
            return;
        }

        let payload = frame.payload.unwrap_or_default();
        if let Some(request_id) = frame.request_id() {
            if self.correlator.complete(request_id, payload.to_owned()) {
                return;
            }
        }

        tracing::trace!(command = %frame.command, "command received");
        self.emit(EngineEvent::CommandReceived {
            command: frame.command,
            payload: payload.to_owned(),
        });
    }

    fn on_login(&mut self, text: &str) {
        if self.state() != ConnectionState::Connected {
            tracing::debug!(state = %self.state(), "ignoring login response outside handshake");
            return;
        }
        self.handshake.disarm();

        match self.handshake.evaluate(text) {
            AuthOutcome::Authenticated(result) => {
                if let Err(e) = self.state.on_authenticated(result.session_key.clone()) {
                    tracing::warn!(error = %e, "could not record session");
                    return;
                }
                tracing::info!(login_ts = result.login_ts, "authenticated");
                self.emit(EngineEvent::Authenticated {
                    session_key: result.session_key,
                });
                if self.config.keepalive {
                    self.keepalive.start(
                        Duration::from_secs(result.ping_interval_secs),
                        Duration::from_secs(result.pong_timeout_secs),
                    );
                }
            }
            AuthOutcome::Rejected(reason) => {
                tracing::warn!(%reason, "login rejected");
                if let Err(e) = self.state.on_auth_failed() {
                    tracing::warn!(error = %e, "unexpected auth failure transition");
                }
                self.emit(EngineEvent::AuthenticationFailed { reason });
                self.teardown(Teardown::Rejected);
            }
        }
    }

    fn on_auth_deadline(&mut self, attempt: u64) {
        if !self.handshake.is_current(attempt) {
            tracing::trace!(attempt, "ignoring stale auth deadline");
            return;
        }
        self.handshake.disarm();
        let timeout = self.handshake.timeout();
        tracing::warn!(attempt, ?timeout, state = %self.state(), "authentication timed out");
        self.teardown(Teardown::Failed(
            ErrorKind::AuthTimeout,
            format!("no login response within {}s", timeout.as_secs_f64()),
        ));
    }

    fn on_keepalive(&mut self, due: KeepaliveDue) {
        if !self.keepalive.is_running() {
            return;
        }
        match due {
            KeepaliveDue::Ping => {
                let seq = self.keepalive.next_seq();
                match self.send_ping(seq) {
                    Ok(()) => tracing::trace!(seq, "ping sent"),
                    Err(e) => tracing::debug!(seq, error = %e, "ping not sent"),
                }
                // Rescheduled even on failure; the pong deadline catches a
                // socket that silently stopped writing.
                self.keepalive.on_ping_sent(Instant::now());
            }
            KeepaliveDue::PongOverdue => {
                tracing::warn!("server stopped answering keepalive");
                self.teardown(Teardown::Failed(
                    ErrorKind::KeepaliveTimeout,
                    "no response to keepalive ping".to_string(),
                ));
            }
        }
    }

    fn send_ping(&mut self, seq: u64) -> Result<(), ChatwireError> {
        let frame = encode(CommandType::Ping, &serde_json::json!({ "id": seq }), None)?;
        self.write(&frame)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Returns the engine to `Closed` and releases everything tied to the
    /// connection. Every path out of a connection ends here.
    fn teardown(&mut self, cause: Teardown) {
        let conn_id = self.current.take();
        let previous = self.state.reset();
        self.handshake.disarm();
        self.keepalive.stop();
        self.connect_config = None;
        self.transport.disconnect();
        let canceled = self.correlator.cancel_all();

        tracing::info!(
            conn_id = ?conn_id.map(ConnectionId::into_inner),
            %previous,
            ?cause,
            canceled,
            "connection torn down"
        );

        if let Teardown::Failed(kind, message) = cause {
            self.emit(EngineEvent::Error { kind, message });
        }
        self.emit(EngineEvent::Disconnected);
    }

    fn emit(&self, event: EngineEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

impl<T: Transport> std::fmt::Debug for ProtocolEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("state", &self.state())
            .field("current", &self.current)
            .field("pending_requests", &self.pending_requests())
            .finish_non_exhaustive()
    }
}
