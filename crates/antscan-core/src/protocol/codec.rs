//! Request encoding and response decoding for the device API.
//!
//! Wire format:
//! ```text
//! request:  {"command": "stats"}            raw bytes, no length prefix, no newline
//! response: {"STATUS":[...],"STATS":[...]}\0 read until the device closes
//! ```
//! The firmware terminates every response with one extra byte (a NUL on
//! every model seen so far).  That byte is always dropped before decoding,
//! whatever its value.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::messages::{CommandKind, DeviceDocument};

/// Errors that can occur while decoding a device response.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The device closed the connection without sending anything.
    #[error("empty response")]
    EmptyResponse,

    /// The response body is not valid UTF-8.
    #[error("response is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The response body is not valid JSON.
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    /// The response decoded to something other than a JSON object.
    #[error("{kind} response is not a JSON object")]
    NotAnObject { kind: CommandKind },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes the request for `kind`.
///
/// # Examples
///
/// ```rust
/// use antscan_core::{encode_request, CommandKind};
///
/// assert_eq!(encode_request(CommandKind::Pools), br#"{"command": "pools"}"#.to_vec());
/// ```
pub fn encode_request(kind: CommandKind) -> Vec<u8> {
    format!(r#"{{"command": "{}"}}"#, kind.as_str()).into_bytes()
}

/// Decodes a complete response read from a device.
///
/// `raw` is everything received before the device closed the connection,
/// including the trailing sentinel byte.
///
/// # Errors
///
/// Returns [`ProtocolError`] when the response is empty, is not UTF-8, is
/// not JSON, or is JSON but not an object.  The inner shape of the object is
/// not validated.
pub fn decode_response(kind: CommandKind, raw: &[u8]) -> Result<DeviceDocument, ProtocolError> {
    let (_sentinel, body) = raw.split_last().ok_or(ProtocolError::EmptyResponse)?;

    let text = std::str::from_utf8(body).map_err(|e| ProtocolError::InvalidUtf8(e.to_string()))?;
    let payload: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    if !payload.is_object() {
        return Err(ProtocolError::NotAnObject { kind });
    }

    Ok(DeviceDocument::new(kind, payload))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn with_sentinel(body: &str) -> Vec<u8> {
        let mut raw = body.as_bytes().to_vec();
        raw.push(0);
        raw
    }

    #[test]
    fn test_encode_stats_request_is_wire_exact() {
        assert_eq!(encode_request(CommandKind::Stats), br#"{"command": "stats"}"#.to_vec());
    }

    #[test]
    fn test_encode_request_has_no_framing() {
        let bytes = encode_request(CommandKind::Pools);
        assert_eq!(bytes.first(), Some(&b'{'));
        assert_eq!(bytes.last(), Some(&b'}'));
    }

    #[test]
    fn test_decode_strips_sentinel_and_parses() {
        // Arrange
        let raw = with_sentinel(r#"{"POOLS":[{"URL":"stratum+tcp://pool1"}]}"#);

        // Act
        let doc = decode_response(CommandKind::Pools, &raw).expect("decode");

        // Assert
        assert_eq!(doc.kind(), CommandKind::Pools);
        assert_eq!(doc.field(0, "URL"), "stratum+tcp://pool1");
    }

    #[test]
    fn test_decode_strips_any_trailing_byte() {
        let raw = br#"{"STATS":[{"Type":"S9"}]} "#;
        let doc = decode_response(CommandKind::Stats, raw).expect("decode");
        assert_eq!(doc.field(0, "Type"), "S9");
    }

    #[test]
    fn test_decode_without_sentinel_fails() {
        // The closing brace is taken as the sentinel, leaving broken JSON.
        let raw = br#"{"STATS":[]}"#;
        assert!(matches!(
            decode_response(CommandKind::Stats, raw),
            Err(ProtocolError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_decode_empty_response_fails() {
        assert_eq!(
            decode_response(CommandKind::Stats, &[]),
            Err(ProtocolError::EmptyResponse)
        );
    }

    #[test]
    fn test_decode_sentinel_only_fails_as_invalid_json() {
        assert!(matches!(
            decode_response(CommandKind::Stats, &[0]),
            Err(ProtocolError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_decode_invalid_utf8_fails() {
        let raw = [b'{', 0xFF, 0xFE, b'}', 0];
        assert!(matches!(
            decode_response(CommandKind::Pools, &raw),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_decode_non_object_fails() {
        let raw = with_sentinel("[1,2,3]");
        assert_eq!(
            decode_response(CommandKind::Pools, &raw),
            Err(ProtocolError::NotAnObject { kind: CommandKind::Pools })
        );
    }

    #[test]
    fn test_decode_object_without_section_is_accepted() {
        // Shape is not validated; the record builder degrades to empty fields.
        let raw = with_sentinel(r#"{"STATUS":[{"STATUS":"E","Msg":"Invalid command"}]}"#);
        let doc = decode_response(CommandKind::Stats, &raw).expect("decode");
        assert!(doc.section().is_empty());
    }
}
