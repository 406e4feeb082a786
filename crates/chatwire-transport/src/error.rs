/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket is not open, so nothing can be written to it.
    #[error("socket is not open")]
    NotOpen,

    /// The connection was closed while an operation was in progress.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}
