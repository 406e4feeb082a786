//! Unified error type for the Chatwire engine.

use chatwire_correlator::CorrelatorError;
use chatwire_protocol::{CommandType, ProtocolError};
use chatwire_session::SessionError;
use chatwire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// These are returned for things the caller did wrong (bad config, a
/// second `connect`, encoding the sentinel type) or that point at a bug.
/// Runtime conditions such as a dropped socket, a rejected login or an
/// acknowledgement timeout are never errors; they arrive as events or as
/// a [`Reply`](crate::Reply).
#[derive(Debug, thiserror::Error)]
pub enum ChatwireError {
    /// A transport-level error (opening the socket).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (sentinel type, non-object payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A correlation error (duplicate request id).
    #[error(transparent)]
    Correlator(#[from] CorrelatorError),

    /// A session-level error (invalid config, connect while active).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The command is driven by the engine itself and cannot be sent
    /// through `send_command`.
    #[error("{0} is reserved for the login handshake")]
    ReservedCommand(CommandType),

    /// The engine task behind an [`EngineHandle`](crate::EngineHandle)
    /// has stopped.
    #[error("engine has stopped")]
    EngineStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: ChatwireError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, ChatwireError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: ChatwireError = ProtocolError::SentinelType.into();
        assert!(matches!(err, ChatwireError::Protocol(_)));
    }

    #[test]
    fn test_from_correlator_error() {
        let err: ChatwireError = CorrelatorError::DuplicateRequestId("r1".into()).into();
        assert!(matches!(err, ChatwireError::Correlator(_)));
        assert!(err.to_string().contains("r1"));
    }

    #[test]
    fn test_from_session_error() {
        let err: ChatwireError = SessionError::InvalidConfig("user_id is required".into()).into();
        assert!(matches!(err, ChatwireError::Session(_)));
    }

    #[test]
    fn test_reserved_command_message() {
        let err = ChatwireError::ReservedCommand(CommandType::Login);
        assert_eq!(err.to_string(), "LOGI is reserved for the login handshake");
    }
}
