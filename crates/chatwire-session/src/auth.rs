//! The login handshake.
//!
//! Right after the socket opens, the client sends a `LOGI` command with
//! its user id (and access token, if any). The server answers with a
//! `LOGI` frame carrying a session key, or an error.
//!
//! Login is matched by its tag, never by `req_id`: servers are not
//! consistent about echoing one for login, and routing login through the
//! generic acknowledgement path risks it being swallowed there.
//!
//! The handshake is bounded by a deadline. If no login response arrives
//! in time the connection is abandoned, which is reported differently
//! from an explicit rejection: a silent server and a server that says
//! "no" call for different reactions from the caller.

use std::time::Duration;

use chatwire_protocol::{CommandType, LoginRequest, LoginResult, decode_login, encode};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::{ConnectConfig, SessionError};

/// Default time allowed from `connect` to a login response.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest login deadline. Longer timeouts are cut to this.
pub const MAX_AUTH_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// What a login response meant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The server issued a session key.
    Authenticated(LoginResult),
    /// The server refused, or the response was unusable. Carries a
    /// human-readable reason.
    Rejected(String),
}

/// Drives one login exchange and its deadline.
///
/// The deadline timer never touches engine state. When it fires it posts
/// the attempt number it was armed for to the channel given to
/// [`arm`](Self::arm); the engine checks [`is_current`](Self::is_current)
/// before acting, so a deadline that lost a race with a login response is
/// ignored.
#[derive(Debug)]
pub struct AuthHandshake {
    timeout: Duration,
    armed: Option<(u64, AbortHandle)>,
}

impl AuthHandshake {
    /// Creates a handshake with the given deadline, capped at
    /// [`MAX_AUTH_TIMEOUT`].
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: timeout.min(MAX_AUTH_TIMEOUT),
            armed: None,
        }
    }

    /// The configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the `LOGI` frame for `config`. No `req_id` is attached.
    pub fn login_frame(&self, config: &ConnectConfig) -> Result<String, SessionError> {
        let request = LoginRequest {
            user_id: config.user_id.clone(),
            access_token: config.access_token.clone(),
        };
        Ok(encode(CommandType::Login, &request, None)?)
    }

    /// Starts the deadline for connection attempt `attempt`.
    ///
    /// Replaces any deadline already running. Requires a Tokio runtime.
    pub fn arm(&mut self, attempt: u64, fired: mpsc::UnboundedSender<u64>) {
        self.disarm();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = fired.send(attempt);
        })
        .abort_handle();
        self.armed = Some((attempt, timer));
    }

    /// Stops the deadline. Returns `true` if one was running.
    pub fn disarm(&mut self) -> bool {
        match self.armed.take() {
            Some((_, timer)) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a deadline is running.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Whether a fired deadline for `attempt` should still be acted on.
    pub fn is_current(&self, attempt: u64) -> bool {
        matches!(self.armed, Some((armed, _)) if armed == attempt)
    }

    /// Interprets a `LOGI` frame.
    ///
    /// Success needs both a clear error flag and a non-empty session key.
    /// Anything else, including a frame that does not parse, is a
    /// rejection.
    pub fn evaluate(&self, frame: &str) -> AuthOutcome {
        match decode_login(frame) {
            Some(result) if result.is_success() => AuthOutcome::Authenticated(result),
            Some(result) => AuthOutcome::Rejected(result.failure_reason()),
            None => AuthOutcome::Rejected("unparseable login response".to_string()),
        }
    }
}

impl Default for AuthHandshake {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_TIMEOUT)
    }
}

impl Drop for AuthHandshake {
    fn drop(&mut self) {
        self.disarm();
    }
}
