//! Wire protocol for Chatwire.
//!
//! This crate defines the text frames the client and the messaging server
//! exchange:
//!
//! - **Types** ([`CommandType`]): the fixed 4-character command tags and
//!   which of them the server acknowledges.
//! - **Codec** ([`encode`], [`decode_type`], [`decode_payload`],
//!   [`decode_login`], [`extract_request_id`]): building and picking
//!   apart `TAG{json}` frames.
//! - **Login** ([`LoginRequest`], [`LoginResult`]): the handshake payloads.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text frames) and the
//! engine (state, correlation). It does not know about sockets or pending
//! requests.
//!
//! ```text
//! Transport (text) → Protocol (CommandType + JSON) → Engine (routing)
//! ```

mod codec;
mod error;
mod login;
mod types;

pub use codec::{
    Frame, REQUEST_ID_KEY, decode_login, decode_payload, decode_type, encode, extract_request_id,
};
pub use error::ProtocolError;
pub use login::{DEFAULT_PING_INTERVAL_SECS, DEFAULT_PONG_TIMEOUT_SECS, LoginRequest, LoginResult};
pub use types::{CommandType, TAG_LEN};
