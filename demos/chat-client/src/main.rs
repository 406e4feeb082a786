use chatwire::prelude::*;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings read from `CHATWIRE_*` environment variables.
#[derive(Debug)]
struct Settings {
    connect: ConnectConfig,
    channel_url: String,
}

fn settings(var: impl Fn(&str) -> Option<String>) -> Result<Settings, String> {
    let user_id = var("CHATWIRE_USER_ID").ok_or("CHATWIRE_USER_ID is not set")?;
    let app_id = var("CHATWIRE_APP_ID").unwrap_or_default();
    let channel_url = var("CHATWIRE_CHANNEL").unwrap_or_else(|| "general".to_string());

    let mut connect = ConnectConfig::new(app_id, user_id);
    if let Some(token) = var("CHATWIRE_ACCESS_TOKEN") {
        connect = connect.with_access_token(token);
    }
    if let Some(url) = var("CHATWIRE_URL") {
        connect = connect.with_base_url(url);
    }
    connect.validate().map_err(|e| e.to_string())?;

    Ok(Settings {
        connect,
        channel_url,
    })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = settings(|name| std::env::var(name).ok())?;
    let (engine, mut events) = ProtocolEngine::new(EngineConfig::default(), WebSocketTransport::new());
    let handle = engine.spawn();
    handle.connect(settings.connect).await?;

    // Wait for login before reading input.
    loop {
        match events.recv().await {
            Some(EngineEvent::Authenticated { .. }) => break,
            Some(EngineEvent::AuthenticationFailed { reason }) => {
                return Err(format!("login rejected: {reason}").into());
            }
            Some(EngineEvent::Error { kind, message }) => {
                return Err(format!("{kind} error: {message}").into());
            }
            Some(_) => {}
            None => return Err("engine stopped".into()),
        }
    }
    eprintln!("logged in; type a message and press enter (ctrl-d to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let payload = json!({ "channel_url": settings.channel_url, "message": line });
                match handle.send_command(CommandType::UserMessage, payload, None).await? {
                    Reply::Acked(ack) => tracing::info!(%ack, "message delivered"),
                    other => tracing::warn!(reply = ?other, "message not acknowledged"),
                }
            }
            event = events.recv() => match event {
                Some(EngineEvent::CommandReceived { command, payload }) => {
                    println!("{command} {payload}");
                }
                Some(EngineEvent::Disconnected) | None => {
                    eprintln!("disconnected");
                    break;
                }
                Some(other) => tracing::debug!(?other, "event"),
            },
        }
    }

    handle.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_settings_require_user_id() {
        let err = settings(vars(&[("CHATWIRE_APP_ID", "APP")])).unwrap_err();
        assert!(err.contains("CHATWIRE_USER_ID"));
    }

    #[test]
    fn test_settings_with_app_id() {
        let settings = settings(vars(&[
            ("CHATWIRE_APP_ID", "APP"),
            ("CHATWIRE_USER_ID", "alice"),
            ("CHATWIRE_ACCESS_TOKEN", "tok"),
        ]))
        .unwrap();

        assert_eq!(settings.connect.user_id, "alice");
        assert_eq!(settings.connect.access_token.as_deref(), Some("tok"));
        assert_eq!(settings.channel_url, "general");
    }

    #[test]
    fn test_settings_custom_url_without_app_id() {
        let settings = settings(vars(&[
            ("CHATWIRE_USER_ID", "alice"),
            ("CHATWIRE_URL", "ws://localhost:9000"),
            ("CHATWIRE_CHANNEL", "random"),
        ]))
        .unwrap();

        assert_eq!(settings.connect.base_url.as_deref(), Some("ws://localhost:9000"));
        assert_eq!(settings.channel_url, "random");
    }

    #[test]
    fn test_settings_missing_app_id_and_url_is_invalid() {
        let err = settings(vars(&[("CHATWIRE_USER_ID", "alice")])).unwrap_err();
        assert!(err.contains("app_id"));
    }
}
