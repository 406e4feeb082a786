//! Error types for the protocol layer.
//!
//! Decoding never produces these: malformed inbound frames decode to
//! "nothing" and are dropped. Only encoding can fail, and only when the
//! caller asks for something the wire format cannot express.

/// Errors that can occur while encoding an outbound command.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Tried to encode the `None` sentinel, which has no wire tag.
    /// This is a bug in the caller, not a runtime condition.
    #[error("cannot encode the sentinel command type")]
    SentinelType,

    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The command is invalid at the protocol level, e.g. a payload that
    /// is not a JSON object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
