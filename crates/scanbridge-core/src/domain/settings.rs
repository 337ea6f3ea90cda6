//! Output configuration pushed by the desktop UI.
//!
//! The UI owns these values and replaces them wholesale with every
//! `sendSettings` call — the server never merges or persists them.  The JSON
//! shape mirrors what the settings editor already produces:
//!
//! ```json
//! {
//!   "enableRealtimeStrokes": true,
//!   "enableOpenInBrowser": false,
//!   "template": [
//!     {"type": "text", "value": "SKU:"},
//!     {"type": "barcode"},
//!     {"type": "key", "value": "enter"}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// One element of the output template.  Order is significant: the emitted
/// action sequence follows the component order exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TemplateComponent {
    /// The scan's decoded text, typed literally.
    #[serde(rename = "barcode")]
    Barcode,
    /// A fixed string, typed literally.
    #[serde(rename = "text")]
    Literal { value: String },
    /// A single key press (e.g. `"enter"`, `"tab"`).
    #[serde(rename = "key")]
    Key { value: String },
    /// A field-path expression evaluated against the scan (see
    /// [`template`](crate::domain::template) for the grammar).
    #[serde(rename = "variable")]
    Variable { value: String },
}

/// The current output configuration.
///
/// May be absent entirely before the UI sends its first update; the server
/// treats an absent snapshot as "all output features disabled".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputSettings {
    /// Replay each accepted scan as keystrokes in real time.
    pub enable_realtime_strokes: bool,
    /// Open the first scanning result's text as an external URL.
    pub enable_open_in_browser: bool,
    /// Ordered output template applied to each scan.
    /// `typedString` is the legacy field name used by older settings editors.
    #[serde(alias = "typedString")]
    pub template: Vec<TemplateComponent>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_deserialize_from_ui_payload() {
        let json = r#"{
            "enableRealtimeStrokes": true,
            "enableOpenInBrowser": false,
            "template": [
                {"type": "text", "value": "SKU:"},
                {"type": "barcode"},
                {"type": "key", "value": "enter"}
            ]
        }"#;
        let settings: OutputSettings = serde_json::from_str(json).unwrap();
        assert!(settings.enable_realtime_strokes);
        assert!(!settings.enable_open_in_browser);
        assert_eq!(
            settings.template,
            vec![
                TemplateComponent::Literal {
                    value: "SKU:".to_string()
                },
                TemplateComponent::Barcode,
                TemplateComponent::Key {
                    value: "enter".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_settings_accept_legacy_typed_string_field() {
        let json = r#"{"enableRealtimeStrokes":true,"typedString":[{"type":"barcode"}]}"#;
        let settings: OutputSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.template, vec![TemplateComponent::Barcode]);
    }

    #[test]
    fn test_settings_default_is_everything_disabled() {
        let settings = OutputSettings::default();
        assert!(!settings.enable_realtime_strokes);
        assert!(!settings.enable_open_in_browser);
        assert!(settings.template.is_empty());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let settings: OutputSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, OutputSettings::default());
    }

    #[test]
    fn test_variable_component_roundtrips_through_json() {
        let component = TemplateComponent::Variable {
            value: "scan.meta.format".to_string(),
        };
        let json = serde_json::to_string(&component).unwrap();
        assert_eq!(json, r#"{"type":"variable","value":"scan.meta.format"}"#);
        let back: TemplateComponent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, component);
    }
}
