//! End-to-end tests for the scan intake pipeline.
//!
//! Each test starts a real intake server on an ephemeral port and drives it
//! with a real WebSocket client, exercising the full path: transport →
//! codec → registry → settings snapshot → output engine → recorded injection.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use scanbridge_core::{OutputSettings, TemplateComponent};
use scanbridge_server::application::dispatch_output::{InputInjector, UrlOpener};
use scanbridge_server::infrastructure::injection::mock::{RecordedAction, RecordingInjector};
use scanbridge_server::infrastructure::network::intake::IntakeServer;
use scanbridge_server::infrastructure::ui_bridge::{AppState, UiEvent};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    recorder: Arc<RecordingInjector>,
    running: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

async fn start_server() -> TestServer {
    start_server_with(Arc::new(RecordingInjector::new())).await
}

async fn start_server_with(recorder: Arc<RecordingInjector>) -> TestServer {
    let state = AppState::new(
        Arc::clone(&recorder) as Arc<dyn InputInjector>,
        Arc::clone(&recorder) as Arc<dyn UrlOpener>,
    );
    let running = Arc::new(AtomicBool::new(true));

    let server = IntakeServer::bind("127.0.0.1:0".parse().unwrap())
        .await
        .expect("test server must bind");
    let addr = server.local_addr();

    let run_state = Arc::clone(&state);
    let run_flag = Arc::clone(&running);
    let handle = tokio::spawn(async move {
        let _ = server.run(run_state, run_flag).await;
    });

    TestServer {
        addr,
        state,
        recorder,
        running,
        handle,
    }
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/"))
        .await
        .expect("client must connect");
    ws
}

/// Sends `helo` and returns the parsed reply envelope.
async fn complete_handshake(ws: &mut WsClient) -> serde_json::Value {
    ws.send(Message::Text(
        r#"{"action":"helo","data":{"deviceName":"test-device"}}"#.to_string(),
    ))
    .await
    .expect("helo send");
    let reply = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for helo reply")
        .expect("stream ended before helo reply")
        .expect("transport error while waiting for helo reply");
    serde_json::from_str(reply.to_text().expect("helo reply must be text"))
        .expect("helo reply must be JSON")
}

fn put_scan_frame(text: &str) -> Message {
    Message::Text(format!(
        r#"{{"action":"putScan","data":{{"scan":{{"text":"{text}"}},"scannings":[{{"text":"{text}"}}]}}}}"#
    ))
}

fn realtime_settings(template: Vec<TemplateComponent>) -> OutputSettings {
    OutputSettings {
        enable_realtime_strokes: true,
        enable_open_in_browser: false,
        template,
    }
}

/// Polls `recorder` until it holds `expected` actions or two seconds pass.
async fn wait_for_actions(recorder: &RecordingInjector, expected: usize) -> Vec<RecordedAction> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let recorded = recorder.recorded();
        if recorded.len() >= expected || tokio::time::Instant::now() > deadline {
            return recorded;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Handshake ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn helo_reply_carries_host_version_on_the_originating_connection() {
    let server = start_server().await;
    let mut scanner = connect(server.addr).await;
    let mut bystander = connect(server.addr).await;

    let reply = complete_handshake(&mut scanner).await;

    assert_eq!(reply["action"], "helo");
    assert_eq!(reply["data"]["version"], env!("CARGO_PKG_VERSION"));

    // The reply must not leak to other connections.
    let nothing = timeout(Duration::from_millis(300), bystander.next()).await;
    assert!(
        nothing.is_err(),
        "bystander connection received an unexpected frame"
    );
}

#[tokio::test]
async fn handshake_stores_device_name_in_registry() {
    let server = start_server().await;
    let mut scanner = connect(server.addr).await;
    complete_handshake(&mut scanner).await;

    let registry = server.state.registry.lock().await;
    let names: Vec<String> = registry
        .all()
        .into_iter()
        .map(|c| c.display_name)
        .collect();
    assert_eq!(names, vec!["test-device".to_string()]);
}

// ── Scan acceptance gating ────────────────────────────────────────────────────

#[tokio::test]
async fn put_scan_before_handshake_produces_no_ui_event_and_no_output() {
    let server = start_server().await;
    let mut ui_rx = server.state.ui.attach();
    server
        .state
        .settings
        .replace(realtime_settings(vec![TemplateComponent::Barcode]));

    let mut scanner = connect(server.addr).await;
    scanner.send(put_scan_frame("TOO-EARLY")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The connect notification fires, but the scan itself is rejected.
    assert_eq!(ui_rx.try_recv().unwrap(), UiEvent::ClientConnected);
    assert!(ui_rx.try_recv().is_err(), "rejected scan reached the UI");
    assert!(
        server.recorder.recorded().is_empty(),
        "rejected scan was injected"
    );
}

#[tokio::test]
async fn accepted_scan_notifies_ui_and_injects_template_in_order() {
    let server = start_server().await;
    let mut ui_rx = server.state.ui.attach();
    server.state.settings.replace(realtime_settings(vec![
        TemplateComponent::Literal {
            value: "X".to_string(),
        },
        TemplateComponent::Barcode,
    ]));

    let mut scanner = connect(server.addr).await;
    complete_handshake(&mut scanner).await;
    scanner.send(put_scan_frame("ABC123")).await.unwrap();

    let recorded = wait_for_actions(&server.recorder, 2).await;
    assert_eq!(
        recorded,
        vec![
            RecordedAction::TypedText("X".to_string()),
            RecordedAction::TypedText("ABC123".to_string()),
        ]
    );

    let connect_event = timeout(Duration::from_secs(1), ui_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connect_event, UiEvent::ClientConnected);
    let scan_event = timeout(Duration::from_secs(1), ui_rx.recv())
        .await
        .unwrap()
        .unwrap();
    match scan_event {
        UiEvent::ScanReceived { scan } => assert_eq!(scan.text, "ABC123"),
        other => panic!("expected ScanReceived, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_strokes_still_notify_ui_but_inject_nothing() {
    let server = start_server().await;
    let mut ui_rx = server.state.ui.attach();
    server.state.settings.replace(OutputSettings {
        enable_realtime_strokes: false,
        enable_open_in_browser: false,
        template: vec![TemplateComponent::Barcode],
    });

    let mut scanner = connect(server.addr).await;
    complete_handshake(&mut scanner).await;
    scanner.send(put_scan_frame("NO-OUTPUT")).await.unwrap();

    // UI still hears about the scan…
    let mut saw_scan = false;
    for _ in 0..2 {
        if let Ok(Some(UiEvent::ScanReceived { scan })) =
            timeout(Duration::from_secs(1), ui_rx.recv()).await
        {
            assert_eq!(scan.text, "NO-OUTPUT");
            saw_scan = true;
        }
    }
    assert!(saw_scan, "UI never received the scan notification");

    // …but nothing is injected.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(server.recorder.recorded().is_empty());
}

#[tokio::test]
async fn scan_before_first_settings_update_is_a_safe_noop() {
    let server = start_server().await;
    let mut ui_rx = server.state.ui.attach();
    // No settings pushed at all.

    let mut scanner = connect(server.addr).await;
    complete_handshake(&mut scanner).await;
    scanner.send(put_scan_frame("EARLY-BIRD")).await.unwrap();

    // The scan is displayed, nothing is injected, nothing crashes.
    let mut saw_scan = false;
    for _ in 0..2 {
        if let Ok(Some(UiEvent::ScanReceived { scan })) =
            timeout(Duration::from_secs(1), ui_rx.recv()).await
        {
            assert_eq!(scan.text, "EARLY-BIRD");
            saw_scan = true;
        }
    }
    assert!(saw_scan);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(server.recorder.recorded().is_empty());

    // The session survives and keeps serving.
    scanner.send(put_scan_frame("STILL-ALIVE")).await.unwrap();
    let next = timeout(Duration::from_secs(1), ui_rx.recv()).await.unwrap();
    assert!(matches!(next, Some(UiEvent::ScanReceived { .. })));
}

// ── Browser opening ───────────────────────────────────────────────────────────

#[tokio::test]
async fn open_in_browser_uses_first_scanning_result() {
    let server = start_server().await;
    server.state.settings.replace(OutputSettings {
        enable_realtime_strokes: false,
        enable_open_in_browser: true,
        template: Vec::new(),
    });

    let mut scanner = connect(server.addr).await;
    complete_handshake(&mut scanner).await;
    scanner
        .send(put_scan_frame("https://example.com/p/42"))
        .await
        .unwrap();

    let recorded = wait_for_actions(&server.recorder, 1).await;
    assert_eq!(
        recorded,
        vec![RecordedAction::OpenedUrl(
            "https://example.com/p/42".to_string()
        )]
    );
}

#[tokio::test]
async fn open_in_browser_with_empty_scannings_is_skipped() {
    let server = start_server().await;
    server.state.settings.replace(OutputSettings {
        enable_realtime_strokes: false,
        enable_open_in_browser: true,
        template: Vec::new(),
    });

    let mut scanner = connect(server.addr).await;
    complete_handshake(&mut scanner).await;
    scanner
        .send(Message::Text(
            r#"{"action":"putScan","data":{"scan":{"text":"X"}}}"#.to_string(),
        ))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(server.recorder.recorded().is_empty());
}

// ── Robustness ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_and_unknown_frames_do_not_terminate_the_session() {
    let server = start_server().await;
    let mut scanner = connect(server.addr).await;

    scanner
        .send(Message::Text("{definitely not json".to_string()))
        .await
        .unwrap();
    scanner
        .send(Message::Text(
            r#"{"action":"selfDestruct","data":{"when":"now"}}"#.to_string(),
        ))
        .await
        .unwrap();

    // The session must still complete a handshake afterwards.
    let reply = complete_handshake(&mut scanner).await;
    assert_eq!(reply["action"], "helo");
}

// ── Output serialization ──────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_scans_never_interleave_their_keystrokes() {
    // Slow injections make any interleaving visible in the recorded order.
    let recorder = Arc::new(RecordingInjector::with_delay(Duration::from_millis(10)));
    let server = start_server_with(Arc::clone(&recorder)).await;
    server.state.settings.replace(realtime_settings(vec![
        TemplateComponent::Barcode,
        TemplateComponent::Literal {
            value: "-done".to_string(),
        },
    ]));

    let mut scanner_a = connect(server.addr).await;
    let mut scanner_b = connect(server.addr).await;
    complete_handshake(&mut scanner_a).await;
    complete_handshake(&mut scanner_b).await;

    // Near-simultaneous scans from two devices.
    scanner_a.send(put_scan_frame("AAA")).await.unwrap();
    scanner_b.send(put_scan_frame("BBB")).await.unwrap();

    let recorded = wait_for_actions(&recorder, 4).await;
    assert_eq!(recorded.len(), 4, "expected both batches: {recorded:?}");

    let typed = |t: &str| RecordedAction::TypedText(t.to_string());
    let block_a = [typed("AAA"), typed("-done")];
    let block_b = [typed("BBB"), typed("-done")];
    let ab: Vec<_> = block_a.iter().chain(block_b.iter()).cloned().collect();
    let ba: Vec<_> = block_b.iter().chain(block_a.iter()).cloned().collect();
    assert!(
        recorded == ab || recorded == ba,
        "keystroke batches interleaved: {recorded:?}"
    );
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_closes_tracked_connections_and_releases_the_port() {
    let server = start_server().await;
    let mut scanner = connect(server.addr).await;
    complete_handshake(&mut scanner).await;
    assert_eq!(server.state.registry.lock().await.len(), 1);

    server.running.store(false, Ordering::Relaxed);

    // Accept loop exits…
    timeout(Duration::from_secs(2), server.handle)
        .await
        .expect("accept loop did not stop")
        .unwrap();

    // …the session is closed from the server side…
    let closed = timeout(Duration::from_secs(2), async {
        loop {
            match scanner.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "scanner connection was not closed");

    // …the registry drains…
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if server.state.registry.lock().await.is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "registry still holds connections after shutdown"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // …and the port is free again.
    IntakeServer::bind(server.addr)
        .await
        .expect("port must be released after shutdown");
}

#[tokio::test]
async fn shutdown_with_zero_connections_completes() {
    let server = start_server().await;
    server.running.store(false, Ordering::Relaxed);
    timeout(Duration::from_secs(2), server.handle)
        .await
        .expect("accept loop did not stop with zero connections")
        .unwrap();
}
