//! The connection state machine.
//!
//! ```text
//!   Closed ──begin_connect──→ Connecting ──on_open──→ Connected
//!     ↑                                                   │
//!     │                          on_authenticated ────────┤
//!     │                                 ▼                 ▼ on_auth_failed
//!     └────────── reset ────── Authenticated   AuthenticationFailed
//!            (from any state)
//! ```
//!
//! Transitions only move forward, except `reset`, which goes back to
//! `Closed` from anywhere and forgets the session key. The session key is
//! stored here and nowhere else, so "authenticated" and "has a session
//! key" can never disagree.

use std::fmt;

use crate::SessionError;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection. Initial state, and where every teardown ends.
    #[default]
    Closed,
    /// The socket is being opened.
    Connecting,
    /// The socket is open; the login command is in flight.
    Connected,
    /// Login succeeded and a session key is held.
    Authenticated,
    /// The server rejected the login. The engine resets to `Closed`
    /// right after reporting it.
    AuthenticationFailed,
}

impl ConnectionState {
    /// Whether a connection is in flight or up.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Authenticated
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::AuthenticationFailed => "authentication-failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current [`ConnectionState`] and the session key.
///
/// Not thread-safe by itself; the engine owns it and mutates it only from
/// its own logical thread.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    session_key: Option<String>,
}

impl ConnectionStateMachine {
    /// Creates a machine in `Closed`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The session key, present only while `Authenticated`.
    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    /// Shorthand for `state() == Authenticated`.
    pub fn is_authenticated(&self) -> bool {
        self.state == ConnectionState::Authenticated
    }

    fn invalid(&self, event: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            from: self.state,
            event,
        }
    }

    /// `Closed → Connecting`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyActive`] if a connection is in flight or up.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        if self.state.is_active() {
            return Err(SessionError::AlreadyActive(self.state));
        }
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// `Connecting → Connected`: the socket opened.
    pub fn on_open(&mut self) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connecting {
            return Err(self.invalid("open"));
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// `Connected → Authenticated`: login succeeded.
    ///
    /// # Errors
    /// [`SessionError::InvalidTransition`] if not `Connected`, or if the
    /// key is empty (an empty key would break the authenticated-iff-key
    /// invariant).
    pub fn on_authenticated(&mut self, session_key: String) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connected || session_key.is_empty() {
            return Err(self.invalid("authenticate"));
        }
        self.session_key = Some(session_key);
        self.state = ConnectionState::Authenticated;
        Ok(())
    }

    /// `Connecting | Connected → AuthenticationFailed`: login rejected.
    pub fn on_auth_failed(&mut self) -> Result<(), SessionError> {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Err(self.invalid("fail authentication"));
        }
        self.state = ConnectionState::AuthenticationFailed;
        Ok(())
    }

    /// Any state `→ Closed`. Clears the session key.
    ///
    /// Returns the state the machine was in.
    pub fn reset(&mut self) -> ConnectionState {
        self.session_key = None;
        std::mem::take(&mut self.state)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the state machine, named
    //! `test_{function}_{scenario}_{expected}`.

    use super::*;

    fn connected() -> ConnectionStateMachine {
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connect().unwrap();
        machine.on_open().unwrap();
        machine
    }

    #[test]
    fn test_new_starts_closed_without_key() {
        let machine = ConnectionStateMachine::new();
        assert_eq!(machine.state(), ConnectionState::Closed);
        assert!(machine.session_key().is_none());
    }

    #[test]
    fn test_full_happy_path_reaches_authenticated() {
        let mut machine = connected();
        machine.on_authenticated("sess".into()).unwrap();

        assert_eq!(machine.state(), ConnectionState::Authenticated);
        assert_eq!(machine.session_key(), Some("sess"));
        assert!(machine.is_authenticated());
    }

    #[test]
    fn test_begin_connect_while_active_returns_already_active() {
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connect().unwrap();

        assert!(matches!(
            machine.begin_connect(),
            Err(SessionError::AlreadyActive(ConnectionState::Connecting))
        ));
        assert_eq!(machine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_begin_connect_after_auth_failure_allowed() {
        let mut machine = connected();
        machine.on_auth_failed().unwrap();

        assert!(machine.begin_connect().is_ok());
    }

    #[test]
    fn test_on_open_when_closed_is_invalid() {
        let mut machine = ConnectionStateMachine::new();
        assert!(matches!(
            machine.on_open(),
            Err(SessionError::InvalidTransition {
                from: ConnectionState::Closed,
                ..
            })
        ));
    }

    #[test]
    fn test_on_authenticated_before_open_is_invalid() {
        let mut machine = ConnectionStateMachine::new();
        machine.begin_connect().unwrap();

        assert!(machine.on_authenticated("k".into()).is_err());
        assert!(machine.session_key().is_none());
    }

    #[test]
    fn test_on_authenticated_empty_key_is_invalid() {
        let mut machine = connected();
        assert!(machine.on_authenticated(String::new()).is_err());
        assert_eq!(machine.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_on_auth_failed_when_authenticated_is_invalid() {
        let mut machine = connected();
        machine.on_authenticated("k".into()).unwrap();
        assert!(machine.on_auth_failed().is_err());
    }

    #[test]
    fn test_reset_clears_key_and_returns_previous() {
        let mut machine = connected();
        machine.on_authenticated("k".into()).unwrap();

        let previous = machine.reset();

        assert_eq!(previous, ConnectionState::Authenticated);
        assert_eq!(machine.state(), ConnectionState::Closed);
        assert!(machine.session_key().is_none());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ConnectionState::AuthenticationFailed.to_string(), "authentication-failed");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }
}
