//! Connection configuration and URL construction.
//!
//! Configuration is passed in programmatically; nothing here reads files
//! or the environment. [`ConnectConfig`] says who is connecting and
//! where. [`ClientInfo`] describes this client to the server and is
//! stamped onto the connection URL.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::SessionError;

/// Domain used to derive the socket host from an application id.
pub const DEFAULT_DOMAIN: &str = "chatwire.io";

/// Characters escaped in query values: everything except RFC 3986
/// unreserved characters.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// ---------------------------------------------------------------------------
// ClientInfo
// ---------------------------------------------------------------------------

/// Describes this client in the connection URL.
///
/// Sensible defaults are provided; override fields when embedding the
/// engine in a larger SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Platform tag (`p`).
    pub platform: String,
    /// Platform version (`pv`).
    pub platform_version: String,
    /// SDK version (`sv`).
    pub sdk_version: String,
    /// Domain used to derive `wss://ws-<app id>.<domain>`.
    pub domain: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            platform: "rust".to_string(),
            platform_version: std::env::consts::OS.to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectConfig
// ---------------------------------------------------------------------------

/// Who is connecting, and where to.
///
/// # Example
///
/// ```rust
/// use chatwire_session::{ClientInfo, ConnectConfig};
///
/// let config = ConnectConfig::new("APP-1", "alice").with_access_token("t0k");
/// let url = config.build_url(&ClientInfo::default()).unwrap();
/// assert!(url.starts_with("wss://ws-app-1.chatwire.io/?"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectConfig {
    /// Application id. Required unless `base_url` is set.
    pub app_id: String,
    /// The user logging in. Always required.
    pub user_id: String,
    /// Optional access token, for applications that require one.
    pub access_token: Option<String>,
    /// A fully custom socket base URL (`ws://` or `wss://`). When unset
    /// the base is derived from `app_id`.
    pub base_url: Option<String>,
    /// Optional version of the embedding application (`av`).
    pub app_version: Option<String>,
}

impl ConnectConfig {
    /// Creates a config with the two fields most connections need.
    pub fn new(app_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Sets the access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the embedding application's version.
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Checks the required fields.
    ///
    /// # Errors
    /// [`SessionError::InvalidConfig`] naming the first problem found:
    /// - `user_id` is empty,
    /// - `app_id` is empty and no `base_url` is set,
    /// - `base_url` is not a `ws://` or `wss://` URL.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.user_id.trim().is_empty() {
            return Err(SessionError::InvalidConfig("user_id is required".into()));
        }
        match &self.base_url {
            Some(url) => {
                if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                    return Err(SessionError::InvalidConfig(format!(
                        "base_url must start with ws:// or wss://, got {url:?}"
                    )));
                }
            }
            None => {
                if self.app_id.trim().is_empty() {
                    return Err(SessionError::InvalidConfig(
                        "app_id is required unless base_url is set".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The socket base URL, without a trailing slash.
    fn base(&self, client: &ClientInfo) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "wss://ws-{}.{}",
                self.app_id.trim().to_lowercase(),
                client.domain
            ),
        }
    }

    /// Validates the config and builds the full connection URL.
    ///
    /// All query values are percent-encoded. Optional parameters are left
    /// out when unset.
    pub fn build_url(&self, client: &ClientInfo) -> Result<String, SessionError> {
        self.validate()?;

        let mut params: Vec<(&str, &str)> = vec![
            ("p", client.platform.as_str()),
            ("pv", client.platform_version.as_str()),
            ("sv", client.sdk_version.as_str()),
        ];
        if !self.app_id.is_empty() {
            params.push(("ai", self.app_id.as_str()));
        }
        params.push(("user_id", self.user_id.as_str()));
        if let Some(token) = &self.access_token {
            params.push(("access_token", token.as_str()));
        }
        if let Some(version) = &self.app_version {
            params.push(("av", version.as_str()));
        }

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", utf8_percent_encode(value, QUERY_VALUE)))
            .collect::<Vec<_>>()
            .join("&");

        Ok(format!("{}/?{query}", self.base(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClientInfo {
        ClientInfo {
            platform: "rust".into(),
            platform_version: "linux".into(),
            sdk_version: "1.2.3".into(),
            domain: "example.test".into(),
        }
    }

    // =====================================================================
    // validate()
    // =====================================================================

    #[test]
    fn test_validate_missing_user_id_fails() {
        let config = ConnectConfig::new("APP", "  ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("user_id"), "{err}");
    }

    #[test]
    fn test_validate_missing_app_id_without_base_url_fails() {
        let config = ConnectConfig::new("", "alice");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("app_id"), "{err}");
    }

    #[test]
    fn test_validate_missing_app_id_with_base_url_succeeds() {
        let config = ConnectConfig::new("", "alice").with_base_url("ws://127.0.0.1:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_non_websocket_base_url_fails() {
        let config = ConnectConfig::new("APP", "alice").with_base_url("https://example.test");
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    // =====================================================================
    // build_url()
    // =====================================================================

    #[test]
    fn test_build_url_derives_base_from_app_id() {
        let url = ConnectConfig::new("ABC-123", "alice")
            .build_url(&client())
            .unwrap();
        assert_eq!(
            url,
            "wss://ws-abc-123.example.test/?p=rust&pv=linux&sv=1.2.3&ai=ABC-123&user_id=alice"
        );
    }

    #[test]
    fn test_build_url_includes_optional_params() {
        let url = ConnectConfig::new("APP", "alice")
            .with_access_token("tok")
            .with_app_version("4.5")
            .build_url(&client())
            .unwrap();
        assert!(url.ends_with("&user_id=alice&access_token=tok&av=4.5"), "{url}");
    }

    #[test]
    fn test_build_url_percent_encodes_values() {
        let url = ConnectConfig::new("APP", "a b&c=d/é")
            .with_access_token("x+y")
            .build_url(&client())
            .unwrap();
        assert!(url.contains("user_id=a%20b%26c%3Dd%2F%C3%A9"), "{url}");
        assert!(url.contains("access_token=x%2By"), "{url}");
    }

    #[test]
    fn test_build_url_custom_base_trims_slash_and_omits_empty_app_id() {
        let url = ConnectConfig::new("", "alice")
            .with_base_url("ws://127.0.0.1:9000/")
            .build_url(&client())
            .unwrap();
        assert_eq!(
            url,
            "ws://127.0.0.1:9000/?p=rust&pv=linux&sv=1.2.3&user_id=alice"
        );
    }

    #[test]
    fn test_build_url_rejects_invalid_config() {
        assert!(ConnectConfig::new("APP", "").build_url(&client()).is_err());
    }

    #[test]
    fn test_client_info_default_uses_crate_version() {
        let info = ClientInfo::default();
        assert_eq!(info.sdk_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.domain, DEFAULT_DOMAIN);
    }
}
