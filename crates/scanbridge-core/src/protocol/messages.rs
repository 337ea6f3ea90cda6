//! Typed message structs for the scanner protocol.
//!
//! Scanners and the host exchange one UTF-8 JSON object per text frame.
//! Every object is an envelope with an `action` discriminant and an optional
//! `data` payload:
//!
//! ```json
//! {"action":"helo","data":{"deviceName":"Pixel 7"}}
//! {"action":"putScan","data":{"scan":{"text":"ABC123"},"scannings":[{"text":"ABC123"}]}}
//! ```
//!
//! The host replies to `helo` on the same connection:
//!
//! ```json
//! {"action":"helo","data":{"version":"0.1.0"}}
//! ```
//!
//! # Why separate scanner→host and host→scanner message types?
//!
//! The two directions carry different information: scanners send scans and
//! handshakes, the host only ever sends handshake acknowledgements.  Distinct
//! enums make it a compile-time error to feed a host reply back into the
//! intake path.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A decoded barcode/QR payload plus metadata sent by a scanning device.
///
/// Immutable once received: the intake path clones it for the UI and for the
/// output engine, it is never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scan {
    /// The decoded barcode/QR text.
    pub text: String,
    /// Extra fields the device attached to the scan (symbology, timestamps,
    /// device ids, ...).  Values are stringified on decode so the map is
    /// uniformly string → string regardless of what JSON type the device sent.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, String>,
}

impl Scan {
    /// Convenience constructor for a scan with no metadata.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }
}

// serde cannot combine `flatten` with `deserialize_with`, so the lenient
// metadata stringification goes through an intermediate wire struct.
#[derive(Deserialize)]
struct ScanFrame {
    text: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl<'de> Deserialize<'de> for Scan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let frame = ScanFrame::deserialize(deserializer)?;
        Ok(Self {
            text: frame.text,
            metadata: frame
                .extra
                .into_iter()
                .map(|(key, value)| (key, stringify(value)))
                .collect(),
        })
    }
}

/// Renders a JSON value as a plain string: strings verbatim, everything else
/// in its compact JSON form (`42`, `true`, `["a"]`).
fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// All messages a scanner can send to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Handshake.  Must be sent before any scan is accepted; the host replies
    /// with [`ServerMessage::Helo`] carrying its version.
    Helo {
        /// Human-readable device label shown in the host UI.
        device_name: Option<String>,
    },
    /// A scan event.  `scan` is the primary payload; `scannings` is the full
    /// result list, of which the first entry feeds the open-in-browser action.
    PutScan { scan: Scan, scannings: Vec<Scan> },
    /// Any syntactically valid envelope whose `action` the host does not
    /// recognise.  Decoded successfully so the server can skip it silently
    /// instead of dropping the connection.
    Unknown { action: String },
}

/// All messages the host sends to a scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Handshake acknowledgement carrying the host application's version.
    Helo { version: String },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
