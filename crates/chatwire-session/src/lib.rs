//! Connection session management for Chatwire.
//!
//! This crate handles the lifecycle of one client connection:
//!
//! 1. **Configuration**: who connects and where ([`ConnectConfig`],
//!    [`ClientInfo`]), and the connection URL built from them
//! 2. **State**: where the connection is ([`ConnectionStateMachine`]),
//!    including the session key issued at login
//! 3. **Authentication**: the `LOGI` exchange and its deadline
//!    ([`AuthHandshake`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)  ← drives the state machine from transport events
//!     ↕
//! Session Layer (this crate)  ← connection state, session key, login
//!     ↕
//! Protocol Layer (below)  ← LOGI frames, LoginResult
//! ```

mod auth;
mod config;
mod error;
mod state;

pub use auth::{AuthHandshake, AuthOutcome, DEFAULT_AUTH_TIMEOUT, MAX_AUTH_TIMEOUT};
pub use config::{ClientInfo, ConnectConfig, DEFAULT_DOMAIN};
pub use error::SessionError;
pub use state::{ConnectionState, ConnectionStateMachine};
