//! Login command payloads.

use serde::{Deserialize, Serialize};

/// Default keepalive interval when the server does not send one.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 15;

/// Default time to wait for any frame after a ping.
pub const DEFAULT_PONG_TIMEOUT_SECS: u64 = 5;

/// Outbound `LOGI` payload.
///
/// Login is matched by tag, not by `req_id`, so none is injected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    /// The user logging in.
    pub user_id: String,
    /// Optional access token for applications that require one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Inbound `LOGI` payload as the server sends it.
///
/// Every field is optional on the wire; missing fields take protocol
/// defaults.
#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    error: bool,
    #[serde(default = "default_ping_interval")]
    ping_interval: u64,
    #[serde(default = "default_pong_timeout")]
    pong_timeout: u64,
    #[serde(default)]
    login_ts: i64,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_SECS
}

fn default_pong_timeout() -> u64 {
    DEFAULT_PONG_TIMEOUT_SECS
}

/// The parsed outcome of a login response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    /// Session key issued by the server. Empty when absent.
    pub session_key: String,
    /// The server flagged the login as failed.
    pub is_error: bool,
    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,
    /// Seconds to wait for a frame after a ping.
    pub pong_timeout_secs: u64,
    /// Server login timestamp (ms since epoch), 0 when absent.
    pub login_ts: i64,
    /// Server error code, if the server sent one.
    pub error_code: Option<i64>,
    /// Server error message, if the server sent one.
    pub error_message: Option<String>,
}

impl LoginResult {
    /// A login succeeded when the error flag is clear and a session key
    /// was issued.
    pub fn is_success(&self) -> bool {
        !self.is_error && !self.session_key.is_empty()
    }

    /// A short description of why the login failed, for notifications.
    pub fn failure_reason(&self) -> String {
        match (&self.error_message, self.error_code) {
            (Some(message), Some(code)) => format!("{message} (code {code})"),
            (Some(message), None) => message.clone(),
            (None, Some(code)) => format!("login rejected (code {code})"),
            (None, None) if self.is_error => "login rejected by server".to_string(),
            (None, None) => "login response carried no session key".to_string(),
        }
    }

    pub(crate) fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let payload: LoginPayload = serde_json::from_str(json)?;
        Ok(Self {
            session_key: payload.key.unwrap_or_default(),
            is_error: payload.error,
            ping_interval_secs: payload.ping_interval,
            pong_timeout_secs: payload.pong_timeout,
            login_ts: payload.login_ts,
            error_code: payload.code,
            error_message: payload.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_full_payload() {
        let result = LoginResult::from_json(
            r#"{"key":"sess123","error":false,"ping_interval":20,"pong_timeout":8,"login_ts":1700000000000}"#,
        )
        .unwrap();

        assert_eq!(result.session_key, "sess123");
        assert!(!result.is_error);
        assert_eq!(result.ping_interval_secs, 20);
        assert_eq!(result.pong_timeout_secs, 8);
        assert_eq!(result.login_ts, 1_700_000_000_000);
        assert!(result.is_success());
    }

    #[test]
    fn test_from_json_missing_fields_use_defaults() {
        let result = LoginResult::from_json(r#"{"key":"k"}"#).unwrap();

        assert_eq!(result.ping_interval_secs, DEFAULT_PING_INTERVAL_SECS);
        assert_eq!(result.pong_timeout_secs, DEFAULT_PONG_TIMEOUT_SECS);
        assert_eq!(result.login_ts, 0);
        assert!(result.is_success());
    }

    #[test]
    fn test_is_success_false_without_key() {
        let result = LoginResult::from_json(r#"{"error":false}"#).unwrap();
        assert!(!result.is_success());
        assert_eq!(
            result.failure_reason(),
            "login response carried no session key"
        );
    }

    #[test]
    fn test_is_success_false_with_error_flag_even_with_key() {
        let result = LoginResult::from_json(r#"{"key":"k","error":true}"#).unwrap();
        assert!(!result.is_success());
    }

    #[test]
    fn test_failure_reason_prefers_server_message() {
        let result = LoginResult::from_json(
            r#"{"error":true,"code":400302,"message":"Invalid access token"}"#,
        )
        .unwrap();
        assert_eq!(result.failure_reason(), "Invalid access token (code 400302)");
    }

    #[test]
    fn test_login_request_omits_missing_token() {
        let req = LoginRequest {
            user_id: "alice".into(),
            access_token: None,
        };
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"user_id":"alice"}"#);
    }
}
