//! In-memory transport for tests.
//!
//! [`MockTransport`] records every frame the engine sends and lets the
//! test play the server: accept the connection, deliver frames, close or
//! fail the socket. It is a cheap-to-clone handle, so a test keeps one
//! clone and gives the other to the engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Inbox, Transport, TransportError, TransportEvent};

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    refuse_sends: bool,
    inbox: Option<Inbox>,
    urls: Vec<String>,
    sent: Vec<String>,
    disconnects: usize,
}

/// A scriptable [`Transport`] with no network behind it.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a closed mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn post(&self, event: TransportEvent) -> bool {
        self.lock()
            .inbox
            .as_ref()
            .is_some_and(|inbox| inbox.post(event))
    }

    /// Completes the pending connect: marks the socket open and posts
    /// [`TransportEvent::Open`].
    pub fn accept(&self) -> bool {
        self.lock().open = true;
        self.post(TransportEvent::Open)
    }

    /// Delivers a text frame as if the server had sent it.
    pub fn deliver(&self, frame: &str) -> bool {
        self.post(TransportEvent::Message(frame.to_owned()))
    }

    /// Simulates the server closing the socket.
    pub fn close_remote(&self) -> bool {
        self.lock().open = false;
        self.post(TransportEvent::Closed)
    }

    /// Simulates a socket failure.
    pub fn fail(&self, message: &str) -> bool {
        self.lock().open = false;
        self.post(TransportEvent::Error(message.to_owned()))
    }

    /// Makes subsequent sends fail even though the socket reports open.
    pub fn refuse_sends(&self, refuse: bool) {
        self.lock().refuse_sends = refuse;
    }

    /// Frames sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Drains and returns the frames sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().sent)
    }

    /// The URL of the most recent `connect` call.
    pub fn last_url(&self) -> Option<String> {
        self.lock().urls.last().cloned()
    }

    /// How many times `connect` was called.
    pub fn connect_count(&self) -> usize {
        self.lock().urls.len()
    }

    /// How many times `disconnect` was called.
    pub fn disconnect_count(&self) -> usize {
        self.lock().disconnects
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, url: &str, inbox: Inbox) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.open = false;
        state.urls.push(url.to_owned());
        state.inbox = Some(inbox);
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.lock();
        state.open = false;
        state.inbox = None;
        state.disconnects += 1;
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.refuse_sends {
            return Err(TransportError::SendFailed("refused by mock".into()));
        }
        state.sent.push(text.to_owned());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::ConnectionId;

    #[test]
    fn test_send_before_accept_returns_not_open() {
        let mut mock = MockTransport::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        mock.connect("ws://test", Inbox::new(ConnectionId::new(1), tx))
            .unwrap();

        assert!(matches!(mock.send("PING{}"), Err(TransportError::NotOpen)));
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_accept_posts_open_and_allows_sends() {
        let mut mock = MockTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        mock.connect("ws://test", Inbox::new(ConnectionId::new(1), tx))
            .unwrap();

        assert!(mock.accept());
        assert_eq!(rx.try_recv().unwrap().1, TransportEvent::Open);

        mock.send("PING{}").unwrap();
        assert_eq!(mock.take_sent(), vec!["PING{}".to_string()]);
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_disconnect_detaches_inbox() {
        let mut mock = MockTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        mock.connect("ws://test", Inbox::new(ConnectionId::new(1), tx))
            .unwrap();
        mock.accept();
        let _ = rx.try_recv();

        mock.disconnect();

        assert!(!mock.is_open());
        assert!(!mock.deliver("MESG{}"));
        assert_eq!(mock.disconnect_count(), 1);
    }

    #[test]
    fn test_refuse_sends_fails_while_open() {
        let mut mock = MockTransport::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        mock.connect("ws://test", Inbox::new(ConnectionId::new(1), tx))
            .unwrap();
        mock.accept();
        mock.refuse_sends(true);

        assert!(matches!(mock.send("MESG{}"), Err(TransportError::SendFailed(_))));
    }
}
