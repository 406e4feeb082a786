//! Engine configuration.

use std::time::Duration;

use chatwire_correlator::MAX_TIMEOUT;
use chatwire_session::{ClientInfo, DEFAULT_AUTH_TIMEOUT, MAX_AUTH_TIMEOUT};

/// Default time to wait for an acknowledgement.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for a [`ProtocolEngine`](crate::ProtocolEngine).
///
/// Per-connection details (who, where) live in
/// [`ConnectConfig`](chatwire_session::ConnectConfig); this is the part
/// that stays the same across connections.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time allowed from `connect` to a login response. Default: 10 s.
    pub auth_timeout: Duration,
    /// Acknowledgement timeout when `send_command` is given none.
    /// Default: 10 s.
    pub request_timeout: Duration,
    /// Send `PING` at the interval the server announced at login, and
    /// drop the connection if the server goes quiet. Default: on.
    pub keepalive: bool,
    /// How this client describes itself in the connection URL.
    pub client: ClientInfo,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            keepalive: true,
            client: ClientInfo::default(),
        }
    }
}

impl EngineConfig {
    /// Replaces zero durations with the defaults and caps oversized ones.
    ///
    /// A zero auth or request timeout would fail every exchange
    /// immediately. Timeouts are capped at [`MAX_AUTH_TIMEOUT`] and
    /// [`MAX_TIMEOUT`] so a deadline can always be computed.
    pub fn validated(mut self) -> Self {
        if self.auth_timeout.is_zero() {
            tracing::warn!("auth_timeout is zero, using default");
            self.auth_timeout = DEFAULT_AUTH_TIMEOUT;
        }
        if self.request_timeout.is_zero() {
            tracing::warn!("request_timeout is zero, using default");
            self.request_timeout = DEFAULT_REQUEST_TIMEOUT;
        }
        if self.auth_timeout > MAX_AUTH_TIMEOUT {
            tracing::warn!(timeout = ?self.auth_timeout, "auth_timeout too long, capping");
            self.auth_timeout = MAX_AUTH_TIMEOUT;
        }
        if self.request_timeout > MAX_TIMEOUT {
            tracing::warn!(timeout = ?self.request_timeout, "request_timeout too long, capping");
            self.request_timeout = MAX_TIMEOUT;
        }
        self
    }
}
