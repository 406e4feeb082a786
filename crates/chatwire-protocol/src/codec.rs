//! The `TAG{json}` frame codec.
//!
//! Outbound frames are built with [`encode`]. Inbound frames are picked
//! apart with the `decode_*` helpers, which never fail loudly: a frame
//! that is too short, carries an unknown tag, or holds broken JSON simply
//! decodes to "nothing". The server is allowed to send noise, and the
//! engine is expected to shrug it off.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{CommandType, LoginResult, ProtocolError, TAG_LEN};

/// JSON key carrying the correlation id.
pub const REQUEST_ID_KEY: &str = "req_id";

/// Encodes a command as `TAG{json}`.
///
/// `payload` must serialize to a JSON object (or `null`, treated as an
/// empty object). When `request_id` is given it is injected as a
/// top-level `"req_id"` string, replacing any value already there.
///
/// # Errors
/// - [`ProtocolError::SentinelType`] for [`CommandType::None`]
/// - [`ProtocolError::InvalidMessage`] if the payload is not an object
/// - [`ProtocolError::Encode`] if serialization fails
pub fn encode<T: Serialize + ?Sized>(
    command: CommandType,
    payload: &T,
    request_id: Option<&str>,
) -> Result<String, ProtocolError> {
    let tag = command.tag().ok_or(ProtocolError::SentinelType)?;

    let mut object = match serde_json::to_value(payload)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(ProtocolError::InvalidMessage(format!(
                "{tag} payload must be a JSON object, got {}",
                json_kind(&other)
            )));
        }
    };
    if let Some(id) = request_id {
        object.insert(REQUEST_ID_KEY.to_owned(), Value::String(id.to_owned()));
    }

    let json = serde_json::to_string(&object)?;
    let mut frame = String::with_capacity(TAG_LEN + json.len());
    frame.push_str(tag);
    frame.push_str(&json);
    Ok(frame)
}

/// Reads the command type from the first four characters of a frame.
///
/// Returns [`CommandType::None`] when the frame is shorter than a tag or
/// the tag is unknown.
pub fn decode_type(frame: &str) -> CommandType {
    frame
        .get(..TAG_LEN)
        .map_or(CommandType::None, CommandType::from_tag)
}

/// Returns the JSON part of a frame: everything from the first `{`.
///
/// Returns `None` if the frame is shorter than a tag or has no `{`.
pub fn decode_payload(frame: &str) -> Option<&str> {
    if frame.len() < TAG_LEN {
        return None;
    }
    frame.find('{').map(|start| &frame[start..])
}

/// Parses a `LOGI` frame into a [`LoginResult`].
///
/// Returns `None` for any other tag, a missing payload, or JSON that does
/// not parse. Never errors.
pub fn decode_login(frame: &str) -> Option<LoginResult> {
    if decode_type(frame) != CommandType::Login {
        return None;
    }
    let payload = decode_payload(frame)?;
    match LoginResult::from_json(payload) {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::debug!(error = %e, "unparseable login payload");
            None
        }
    }
}

/// Finds the `"req_id"` string value in a JSON payload.
///
/// This is a deliberately small scanner, not a JSON parser. It looks for
/// the `"req_id"` key anywhere in the text, then expects `:` and a quoted
/// string, allowing whitespace in between. Field order does not matter.
///
/// Assumes the id is a plain string without escapes, which is what the
/// engine generates. Returns `None` when the key is absent, the value is
/// not a string, is empty, contains an escape, or is unterminated.
pub fn extract_request_id(payload: &str) -> Option<&str> {
    const QUOTED_KEY: &str = "\"req_id\"";

    let mut from = 0;
    while let Some(found) = payload[from..].find(QUOTED_KEY) {
        let after_key = from + found + QUOTED_KEY.len();
        let rest = payload[after_key..].trim_start();
        // Only a key if a colon follows; otherwise it was a value.
        if let Some(rest) = rest.strip_prefix(':') {
            let value = rest.trim_start().strip_prefix('"')?;
            let end = value.find('"')?;
            let id = &value[..end];
            if id.is_empty() || id.contains('\\') {
                return None;
            }
            return Some(id);
        }
        from = after_key;
    }
    None
}

/// A decoded inbound frame: its type and raw JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// The command type ([`CommandType::None`] if unrecognized).
    pub command: CommandType,
    /// The JSON payload, if the frame had one.
    pub payload: Option<&'a str>,
}

impl<'a> Frame<'a> {
    /// Splits a raw text frame into type and payload.
    pub fn decode(frame: &'a str) -> Self {
        Self {
            command: decode_type(frame),
            payload: decode_payload(frame),
        }
    }

    /// The frame's `req_id`, if its payload carries one.
    pub fn request_id(&self) -> Option<&'a str> {
        self.payload.and_then(extract_request_id)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // =====================================================================
    // encode()
    // =====================================================================

    #[test]
    fn test_encode_prefixes_tag_and_injects_req_id() {
        let frame = encode(
            CommandType::UserMessage,
            &json!({"channel_url": "c1", "message": "hi"}),
            Some("r-1"),
        )
        .unwrap();

        assert!(frame.starts_with("MESG{"));
        let body: Value = serde_json::from_str(&frame[TAG_LEN..]).unwrap();
        assert_eq!(body["req_id"], "r-1");
        assert_eq!(body["message"], "hi");
    }

    #[test]
    fn test_encode_without_request_id_has_no_req_id() {
        let frame = encode(CommandType::Ping, &json!({"id": 1}), None).unwrap();
        assert_eq!(frame, r#"PING{"id":1}"#);
    }

    #[test]
    fn test_encode_overwrites_existing_req_id() {
        let frame = encode(CommandType::Read, &json!({"req_id": "old"}), Some("new")).unwrap();
        assert_eq!(extract_request_id(&frame), Some("new"));
    }

    #[test]
    fn test_encode_null_payload_becomes_empty_object() {
        let frame = encode(CommandType::TypingStart, &Value::Null, None).unwrap();
        assert_eq!(frame, "TPST{}");
    }

    #[test]
    fn test_encode_sentinel_fails() {
        let result = encode(CommandType::None, &json!({}), Some("r"));
        assert!(matches!(result, Err(ProtocolError::SentinelType)));
    }

    #[test]
    fn test_encode_non_object_payload_fails() {
        let result = encode(CommandType::UserMessage, &json!([1, 2]), None);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_decode_type_round_trips_every_command() {
        for ty in CommandType::ALL {
            let frame = encode(*ty, &json!({"x": 1}), Some("id")).unwrap();
            assert_eq!(decode_type(&frame), *ty, "{ty:?}");
        }
    }

    // =====================================================================
    // decode_type() / decode_payload()
    // =====================================================================

    #[test]
    fn test_decode_type_unknown_tag_returns_none() {
        assert_eq!(decode_type(r#"XXXX{"data":"test"}"#), CommandType::None);
    }

    #[test]
    fn test_decode_type_short_frame_returns_none() {
        assert_eq!(decode_type("LOG"), CommandType::None);
        assert_eq!(decode_type(""), CommandType::None);
    }

    #[test]
    fn test_decode_type_multibyte_prefix_returns_none() {
        // Byte 4 falls inside a multi-byte character.
        assert_eq!(decode_type("aéé{}"), CommandType::None);
    }

    #[test]
    fn test_decode_payload_returns_json_part() {
        assert_eq!(decode_payload(r#"MESG{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_decode_payload_without_brace_returns_none() {
        assert_eq!(decode_payload("PING"), None);
        assert_eq!(decode_payload("MESGabc"), None);
    }

    #[test]
    fn test_decode_payload_short_frame_returns_none() {
        assert_eq!(decode_payload("{}"), None);
    }

    // =====================================================================
    // decode_login()
    // =====================================================================

    #[test]
    fn test_decode_login_success_frame() {
        let result = decode_login(
            r#"LOGI{"key":"sess123","error":false,"ping_interval":15,"pong_timeout":5}"#,
        )
        .expect("should parse");
        assert_eq!(result.session_key, "sess123");
        assert!(result.is_success());
    }

    #[test]
    fn test_decode_login_error_frame() {
        let result = decode_login(r#"LOGI{"error":true}"#).expect("should parse");
        assert!(result.is_error);
        assert!(!result.is_success());
    }

    #[test]
    fn test_decode_login_wrong_tag_returns_none() {
        assert!(decode_login(r#"MESG{"key":"k"}"#).is_none());
    }

    #[test]
    fn test_decode_login_broken_json_returns_none() {
        assert!(decode_login(r#"LOGI{"key":"#).is_none());
        assert!(decode_login("LOGI").is_none());
        assert!(decode_login(r#"LOGI{"ping_interval":"soon"}"#).is_none());
    }

    // =====================================================================
    // extract_request_id()
    // =====================================================================

    #[test]
    fn test_extract_request_id_first_field() {
        assert_eq!(extract_request_id(r#"{"req_id":"abc","x":1}"#), Some("abc"));
    }

    #[test]
    fn test_extract_request_id_later_field() {
        assert_eq!(extract_request_id(r#"{"x":1,"req_id":"abc"}"#), Some("abc"));
    }

    #[test]
    fn test_extract_request_id_tolerates_whitespace() {
        assert_eq!(
            extract_request_id(r#"{ "x": 1, "req_id" : "abc" }"#),
            Some("abc")
        );
    }

    #[test]
    fn test_extract_request_id_skips_value_occurrence() {
        assert_eq!(
            extract_request_id(r#"{"note":"req_id","req_id":"r9"}"#),
            Some("r9")
        );
    }

    #[test]
    fn test_extract_request_id_absent_returns_none() {
        assert_eq!(extract_request_id(r#"{"x":1}"#), None);
    }

    #[test]
    fn test_extract_request_id_malformed_returns_none() {
        assert_eq!(extract_request_id(r#"{"req_id":"abc"#), None);
        assert_eq!(extract_request_id(r#"{"req_id":42}"#), None);
        assert_eq!(extract_request_id(r#"{"req_id":""}"#), None);
        assert_eq!(extract_request_id(r#"{"req_id":"a\"b"}"#), None);
    }

    #[test]
    fn test_frame_decode_exposes_request_id() {
        let frame = Frame::decode(r#"MESG{"msg_id":7,"req_id":"r1"}"#);
        assert_eq!(frame.command, CommandType::UserMessage);
        assert_eq!(frame.request_id(), Some("r1"));
    }
}
