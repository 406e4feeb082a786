//! WebSocket client transport using `tokio-tungstenite`.
//!
//! Each connection attempt runs in its own Tokio task. The task owns the
//! socket and does two things at once with `tokio::select!`: it writes
//! frames queued by [`WebSocketTransport::send`], and it reads frames
//! from the server and posts them to the engine's [`Inbox`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, Inbox, Transport, TransportError, TransportEvent};

/// A live (or opening) socket owned by a background task.
struct ActiveSocket {
    conn_id: ConnectionId,
    open: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

/// A [`Transport`] backed by a real WebSocket connection.
///
/// Must be used from inside a Tokio runtime: `connect` spawns the socket
/// task.
#[derive(Default)]
pub struct WebSocketTransport {
    active: Option<ActiveSocket>,
}

impl WebSocketTransport {
    /// Creates a transport with no connection.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str, inbox: Inbox) -> Result<(), TransportError> {
        self.disconnect();

        let conn_id = inbox.conn_id();
        let open = Arc::new(AtomicBool::new(false));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tracing::debug!(%conn_id, url, "opening WebSocket");
        let task = tokio::spawn(run_socket(
            url.to_owned(),
            inbox,
            Arc::clone(&open),
            outbound_rx,
        ));

        self.active = Some(ActiveSocket {
            conn_id,
            open,
            outbound,
            task,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.open.store(false, Ordering::Release);
        // Queue a close frame, then drop the sender so the task exits once
        // the frame is written.
        let _ = active.outbound.send(Message::Close(None));
        drop(active.outbound);
        tracing::debug!(conn_id = %active.conn_id, "WebSocket disconnect requested");
        // The task is detached; it finishes on its own after the close.
        drop(active.task);
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let active = self.active.as_ref().ok_or(TransportError::NotOpen)?;
        if !active.open.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        active
            .outbound
            .send(Message::Text(text.to_owned().into()))
            .map_err(|_| TransportError::ConnectionClosed("writer stopped".into()))
    }

    fn is_open(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.open.load(Ordering::Acquire))
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

/// Socket task: connect, then pump frames in both directions until either
/// side closes.
async fn run_socket(
    url: String,
    inbox: Inbox,
    open: Arc<AtomicBool>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
) {
    let conn_id = inbox.conn_id();
    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "WebSocket connect failed");
            inbox.post(TransportEvent::Error(
                TransportError::ConnectFailed(e.to_string()).to_string(),
            ));
            return;
        }
    };

    // An explicit disconnect may have raced the handshake.
    if outbound_rx.is_closed() {
        return;
    }
    open.store(true, Ordering::Release);
    if !inbox.post(TransportEvent::Open) {
        return;
    }

    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(msg) = outgoing else {
                    // Transport dropped its sender: explicit disconnect.
                    let _ = sink.close().await;
                    break;
                };
                let is_close = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    open.store(false, Ordering::Release);
                    inbox.post(TransportEvent::Error(
                        TransportError::SendFailed(e.to_string()).to_string(),
                    ));
                    break;
                }
                if is_close {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !inbox.post(TransportEvent::Message(text.as_str().to_owned())) {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        match String::from_utf8(data.to_vec()) {
                            Ok(text) => {
                                if !inbox.post(TransportEvent::Message(text)) {
                                    break;
                                }
                            }
                            Err(_) => {
                                tracing::debug!(%conn_id, "dropping non-UTF-8 binary frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        open.store(false, Ordering::Release);
                        inbox.post(TransportEvent::Closed);
                        break;
                    }
                    Some(Ok(_)) => continue, // ping/pong/raw frame
                    Some(Err(e)) => {
                        open.store(false, Ordering::Release);
                        inbox.post(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::Release);
    tracing::debug!(%conn_id, "WebSocket task finished");
}
