//! Engine actor: a Tokio task that owns a [`ProtocolEngine`].
//!
//! The actor loop waits on two things at once: commands from
//! [`EngineHandle`]s, and the engine's own queued inputs (transport
//! events, timers). Whichever is ready first is handled to completion
//! before the next one, so the engine still sees one input at a time.
//!
//! ```text
//! EngineHandle ──EngineCommand──┐
//!                               ├──→ select! ──→ ProtocolEngine
//! transport / timers ───────────┘
//! ```

use std::time::Duration;

use chatwire_protocol::CommandType;
use chatwire_session::{ConnectConfig, ConnectionState};
use chatwire_transport::Transport;
use tokio::sync::{mpsc, oneshot};

use crate::{ChatwireError, PendingReply, ProtocolEngine, Reply};

/// Capacity of the command channel. Senders wait when it is full.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Commands sent to the engine actor.
///
/// Variants with a `reply` carry a oneshot the actor answers on.
enum EngineCommand {
    Connect {
        config: ConnectConfig,
        reply: oneshot::Sender<Result<(), ChatwireError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        command: CommandType,
        payload: serde_json::Value,
        timeout: Option<Duration>,
        reply: oneshot::Sender<Result<PendingReply, ChatwireError>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Shutdown,
}

/// A snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Session key, while authenticated.
    pub session_key: Option<String>,
    /// Commands waiting for an acknowledgement.
    pub pending_requests: usize,
}

/// Handle to a running engine actor.
///
/// Cheap to clone; every clone talks to the same engine. The actor stops
/// when [`shutdown`](Self::shutdown) is called or the last handle is
/// dropped, closing the connection on the way out.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> EngineCommand,
    ) -> Result<R, ChatwireError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| ChatwireError::EngineStopped)?;
        reply_rx.await.map_err(|_| ChatwireError::EngineStopped)
    }

    /// Starts connecting. See [`ProtocolEngine::connect`].
    pub async fn connect(&self, config: ConnectConfig) -> Result<(), ChatwireError> {
        self.request(|reply| EngineCommand::Connect { config, reply })
            .await?
    }

    /// Closes the connection. See [`ProtocolEngine::disconnect`].
    pub async fn disconnect(&self) -> Result<(), ChatwireError> {
        self.request(|reply| EngineCommand::Disconnect { reply })
            .await
    }

    /// Sends a command and waits for its [`Reply`].
    ///
    /// The wait happens in the caller's task, not the actor's, so a slow
    /// acknowledgement never holds up other callers.
    pub async fn send_command(
        &self,
        command: CommandType,
        payload: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<Reply, ChatwireError> {
        let pending = self
            .request(|reply| EngineCommand::Send {
                command,
                payload,
                timeout,
                reply,
            })
            .await??;
        Ok(pending.await)
    }

    /// Current state, session key and pending count.
    pub async fn status(&self) -> Result<EngineStatus, ChatwireError> {
        self.request(|reply| EngineCommand::Status { reply }).await
    }

    /// Current connection state.
    pub async fn state(&self) -> Result<ConnectionState, ChatwireError> {
        Ok(self.status().await?.state)
    }

    /// Session key, while authenticated.
    pub async fn session_key(&self) -> Result<Option<String>, ChatwireError> {
        Ok(self.status().await?.session_key)
    }

    /// Tells the actor to close the connection and stop.
    pub async fn shutdown(&self) -> Result<(), ChatwireError> {
        self.sender
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| ChatwireError::EngineStopped)
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T: Transport> ProtocolEngine<T> {
    /// Moves the engine into its own Tokio task and returns a handle to it.
    pub fn spawn(self) -> EngineHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        tokio::spawn(run(self, rx));
        EngineHandle { sender: tx }
    }

    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Connect { config, reply } => {
                let _ = reply.send(self.connect(config));
            }
            EngineCommand::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            EngineCommand::Send {
                command,
                payload,
                timeout,
                reply,
            } => {
                let _ = reply.send(self.send_command(command, &payload, timeout));
            }
            EngineCommand::Status { reply } => {
                let _ = reply.send(EngineStatus {
                    state: self.state(),
                    session_key: self.session_key().map(str::to_owned),
                    pending_requests: self.pending_requests(),
                });
            }
            EngineCommand::Shutdown => return false,
        }
        true
    }
}

async fn run<T: Transport>(mut engine: ProtocolEngine<T>, mut commands: mpsc::Receiver<EngineCommand>) {
    tracing::info!("engine actor started");

    loop {
        tokio::select! {
            command = commands.recv() => {
                let keep_running = match command {
                    Some(command) => engine.handle_command(command),
                    None => false,
                };
                if !keep_running {
                    break;
                }
            }
            input = engine.next_input() => engine.apply(input),
        }
    }

    engine.disconnect();
    tracing::info!("engine actor stopped");
}
