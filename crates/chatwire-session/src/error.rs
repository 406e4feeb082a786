//! Error types for the session layer.

use chatwire_protocol::ProtocolError;

use crate::ConnectionState;

/// Errors that can occur while configuring or driving a connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connect configuration is missing something it needs.
    #[error("invalid connect config: {0}")]
    InvalidConfig(String),

    /// `connect` was called while a connection is already in flight or up.
    /// Only one attempt may be active at a time.
    #[error("a connection is already {0}")]
    AlreadyActive(ConnectionState),

    /// An event arrived that the current state does not accept.
    #[error("cannot {event} while {from}")]
    InvalidTransition {
        /// The state the machine was in.
        from: ConnectionState,
        /// What was attempted.
        event: &'static str,
    },

    /// Building the login frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
