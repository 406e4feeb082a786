//! # Chatwire
//!
//! Client-side engine for a real-time messaging protocol spoken over one
//! WebSocket connection.
//!
//! The engine opens the socket, logs in, keeps the connection alive, sends
//! commands, matches the server's acknowledgements to the commands that
//! asked for them, and hands everything else the server pushes to the
//! caller as events.
//!
//! ```text
//!   caller ──connect / send_command──→ ProtocolEngine ──text frames──→ Transport
//!     ▲                                  │      ▲                         │
//!     │        EngineEvent / Reply       │      └──TransportEvent (inbox)─┘
//!     └──────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatwire::prelude::*;
//!
//! # async fn demo() -> Result<(), ChatwireError> {
//! let (engine, mut events) = ProtocolEngine::new(EngineConfig::default(), WebSocketTransport::new());
//! let handle = engine.spawn();
//!
//! handle.connect(ConnectConfig::new("APP_ID", "alice")).await?;
//! while let Some(event) = events.recv().await {
//!     if let EngineEvent::Authenticated { .. } = event {
//!         break;
//!     }
//! }
//!
//! let reply = handle
//!     .send_command(
//!         CommandType::UserMessage,
//!         serde_json::json!({ "channel_url": "general", "message": "hi" }),
//!         None,
//!     )
//!     .await?;
//! println!("{reply:?}");
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
mod event;
mod handle;
mod keepalive;

pub use config::{DEFAULT_REQUEST_TIMEOUT, EngineConfig};
pub use engine::ProtocolEngine;
pub use error::ChatwireError;
pub use event::{EngineEvent, ErrorKind, EventReceiver, PendingReply, Reply};
pub use handle::{EngineHandle, EngineStatus};

pub use chatwire_correlator as correlator;
pub use chatwire_protocol as protocol;
pub use chatwire_session as session;
pub use chatwire_transport as transport;

/// Everything needed to connect and exchange commands.
pub mod prelude {
    pub use crate::{
        ChatwireError, EngineConfig, EngineEvent, EngineHandle, EngineStatus, ErrorKind,
        EventReceiver, PendingReply, ProtocolEngine, Reply,
    };
    pub use chatwire_protocol::CommandType;
    pub use chatwire_session::{ClientInfo, ConnectConfig, ConnectionState};
    pub use chatwire_transport::{Transport, WebSocketTransport};
}
