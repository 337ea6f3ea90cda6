//! Frame codec: one JSON envelope per text frame.
//!
//! [`decode_client_message`] is deliberately forgiving at the envelope level:
//! an envelope whose `action` is unrecognised decodes to
//! [`ClientMessage::Unknown`] rather than an error, because scanners may be
//! newer than the host and send actions this version does not implement.
//! Only genuinely malformed frames (broken JSON, missing `action`, a `data`
//! payload that does not match the action's schema) produce a [`DecodeError`],
//! and the intake server drops those without terminating the connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::messages::{ClientMessage, Scan, ServerMessage};

/// Error type for frame decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON, or not a JSON object.
    #[error("invalid JSON frame: {0}")]
    Syntax(#[from] serde_json::Error),
    /// The envelope has no `action` field.
    #[error("frame envelope has no \"action\" field")]
    MissingAction,
    /// The action requires a `data` payload but none was present.
    #[error("action {action:?} requires a \"data\" payload")]
    MissingData { action: String },
    /// The `data` payload does not match the action's schema.
    #[error("malformed \"data\" payload for action {action:?}: {source}")]
    BadData {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

// ── Wire envelope ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
    action: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeloData {
    #[serde(default)]
    device_name: Option<String>,
}

#[derive(Deserialize)]
struct PutScanData {
    scan: Scan,
    #[serde(default)]
    scannings: Vec<Scan>,
}

#[derive(Serialize)]
struct OutEnvelope<T: Serialize> {
    action: &'static str,
    data: T,
}

#[derive(Serialize)]
struct HeloReplyData<'a> {
    version: &'a str,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one text frame into a [`ClientMessage`].
///
/// # Errors
///
/// Returns [`DecodeError`] for broken JSON, a missing `action`, or a `data`
/// payload that does not match the schema of a recognised action.  Unknown
/// actions are NOT an error; they decode to [`ClientMessage::Unknown`].
pub fn decode_client_message(frame: &str) -> Result<ClientMessage, DecodeError> {
    let envelope: Envelope = serde_json::from_str(frame)?;
    let Some(action) = envelope.action else {
        return Err(DecodeError::MissingAction);
    };

    if action == "helo" {
        // `data` and `deviceName` are both optional on the handshake.
        let device_name = match envelope.data {
            Some(value) => {
                serde_json::from_value::<HeloData>(value)
                    .map_err(|source| DecodeError::BadData { action, source })?
                    .device_name
            }
            None => None,
        };
        Ok(ClientMessage::Helo { device_name })
    } else if action == "putScan" {
        let value = envelope.data.ok_or_else(|| DecodeError::MissingData {
            action: action.clone(),
        })?;
        let data: PutScanData = serde_json::from_value(value)
            .map_err(|source| DecodeError::BadData { action, source })?;
        Ok(ClientMessage::PutScan {
            scan: data.scan,
            scannings: data.scannings,
        })
    } else {
        Ok(ClientMessage::Unknown { action })
    }
}

/// Encodes a host reply as one JSON text frame.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if serialization fails (it cannot
/// for the current message set, but the signature stays honest for future
/// variants carrying arbitrary payloads).
pub fn encode_server_message(message: &ServerMessage) -> Result<String, serde_json::Error> {
    match message {
        ServerMessage::Helo { version } => serde_json::to_string(&OutEnvelope {
            action: "helo",
            data: HeloReplyData { version },
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_helo_with_device_name() {
        let msg =
            decode_client_message(r#"{"action":"helo","data":{"deviceName":"Pixel 7"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Helo {
                device_name: Some("Pixel 7".to_string())
            }
        );
    }

    #[test]
    fn test_decode_helo_without_data() {
        let msg = decode_client_message(r#"{"action":"helo"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Helo { device_name: None });
    }

    #[test]
    fn test_decode_helo_with_empty_data_object() {
        let msg = decode_client_message(r#"{"action":"helo","data":{}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Helo { device_name: None });
    }

    #[test]
    fn test_decode_put_scan() {
        let frame = r#"{"action":"putScan","data":{"scan":{"text":"ABC123","format":"qr"},"scannings":[{"text":"ABC123"}]}}"#;
        let msg = decode_client_message(frame).unwrap();
        match msg {
            ClientMessage::PutScan { scan, scannings } => {
                assert_eq!(scan.text, "ABC123");
                assert_eq!(scan.metadata.get("format").map(String::as_str), Some("qr"));
                assert_eq!(scannings.len(), 1);
                assert_eq!(scannings[0].text, "ABC123");
            }
            other => panic!("expected PutScan, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_put_scan_without_scannings_defaults_to_empty() {
        let frame = r#"{"action":"putScan","data":{"scan":{"text":"X"}}}"#;
        match decode_client_message(frame).unwrap() {
            ClientMessage::PutScan { scannings, .. } => assert!(scannings.is_empty()),
            other => panic!("expected PutScan, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_put_scan_without_data_is_an_error() {
        let result = decode_client_message(r#"{"action":"putScan"}"#);
        assert!(matches!(result, Err(DecodeError::MissingData { .. })));
    }

    #[test]
    fn test_decode_put_scan_with_wrong_data_shape_is_an_error() {
        let result = decode_client_message(r#"{"action":"putScan","data":{"scan":42}}"#);
        assert!(matches!(result, Err(DecodeError::BadData { .. })));
    }

    #[test]
    fn test_decode_unknown_action_is_not_an_error() {
        let msg = decode_client_message(r#"{"action":"setLamp","data":{"on":true}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Unknown {
                action: "setLamp".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_broken_json() {
        assert!(matches!(
            decode_client_message("{not json"),
            Err(DecodeError::Syntax(_))
        ));
    }

    #[test]
    fn test_decode_rejects_envelope_without_action() {
        assert!(matches!(
            decode_client_message(r#"{"data":{}}"#),
            Err(DecodeError::MissingAction)
        ));
    }

    #[test]
    fn test_encode_helo_reply_exact_wire_shape() {
        // Byte-exact: existing scanner apps parse this reply.
        let frame = encode_server_message(&ServerMessage::Helo {
            version: "1.2.3".to_string(),
        })
        .unwrap();
        assert_eq!(frame, r#"{"action":"helo","data":{"version":"1.2.3"}}"#);
    }
}
