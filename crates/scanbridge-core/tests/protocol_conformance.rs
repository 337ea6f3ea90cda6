//! Wire-format conformance tests.
//!
//! These fixtures pin the exact JSON shapes the deployed scanner apps produce
//! and consume.  If any of them fail after a refactor, the change breaks
//! devices in the field.

use scanbridge_core::{
    decode_client_message, encode_server_message, expand_template, ClientMessage, OutputAction,
    OutputSettings, ServerMessage, TemplateComponent,
};

#[test]
fn handshake_frame_from_android_app_decodes() {
    let frame = r#"{"action":"helo","data":{"deviceName":"Pixel 7 Pro"}}"#;
    let msg = decode_client_message(frame).expect("handshake must decode");
    assert_eq!(
        msg,
        ClientMessage::Helo {
            device_name: Some("Pixel 7 Pro".to_string())
        }
    );
}

#[test]
fn scan_frame_from_android_app_decodes() {
    // Captured from a real device session: the scan payload plus the
    // scannings result list used by the open-in-browser feature.
    let frame = r#"{"action":"putScan","data":{"scan":{"text":"https://example.com/p/42","format":"QR_CODE","date":1714670000000},"scannings":[{"text":"https://example.com/p/42"}]}}"#;
    match decode_client_message(frame).expect("scan must decode") {
        ClientMessage::PutScan { scan, scannings } => {
            assert_eq!(scan.text, "https://example.com/p/42");
            assert_eq!(
                scan.metadata.get("format").map(String::as_str),
                Some("QR_CODE")
            );
            // Numeric metadata is stringified, never rejected.
            assert_eq!(
                scan.metadata.get("date").map(String::as_str),
                Some("1714670000000")
            );
            assert_eq!(scannings[0].text, "https://example.com/p/42");
        }
        other => panic!("expected PutScan, got {other:?}"),
    }
}

#[test]
fn helo_reply_matches_what_deployed_clients_parse() {
    let frame = encode_server_message(&ServerMessage::Helo {
        version: "0.1.0".to_string(),
    })
    .unwrap();
    assert_eq!(frame, r#"{"action":"helo","data":{"version":"0.1.0"}}"#);
}

#[test]
fn newer_client_actions_are_skippable_not_fatal() {
    // A future app version may send actions this host has never heard of.
    let msg = decode_client_message(r#"{"action":"putScannings","data":{"scannings":[]}}"#)
        .expect("unknown actions must still decode");
    assert_eq!(
        msg,
        ClientMessage::Unknown {
            action: "putScannings".to_string()
        }
    );
}

#[test]
fn ui_settings_payload_drives_template_expansion() {
    // The settings JSON straight from the UI, applied to a decoded scan.
    let settings: OutputSettings = serde_json::from_str(
        r#"{
            "enableRealtimeStrokes": true,
            "enableOpenInBrowser": false,
            "template": [
                {"type": "text", "value": "X"},
                {"type": "barcode"}
            ]
        }"#,
    )
    .unwrap();

    let frame = r#"{"action":"putScan","data":{"scan":{"text":"ABC123"}}}"#;
    let scan = match decode_client_message(frame).unwrap() {
        ClientMessage::PutScan { scan, .. } => scan,
        other => panic!("expected PutScan, got {other:?}"),
    };

    let actions = expand_template(&settings.template, &scan);
    assert_eq!(
        actions,
        vec![
            OutputAction::TypeText("X".to_string()),
            OutputAction::TypeText("ABC123".to_string()),
        ]
    );
    assert_eq!(
        settings.template[1],
        TemplateComponent::Barcode,
        "expansion must not consume or reorder the template"
    );
}
