//! Scan intake server: accept loop and per-connection session handling.
//!
//! This module is responsible for:
//!
//! 1. Binding the TCP listener on the well-known intake port (57891).
//! 2. Accepting incoming connections from scanner devices.
//! 3. Upgrading each connection to a WebSocket session (one UTF-8 JSON
//!    message per text frame).
//! 4. Registering the connection and driving its handshake state machine.
//! 5. Dispatching accepted scans to the UI sink, the output engine, and the
//!    browser-open capability.
//! 6. Shutting down when the shared `running` flag is cleared: every session
//!    closes, the registry drains, and dropping the listener releases the
//!    port.
//!
//! # Scalability
//!
//! Each scanner session runs in its own Tokio task; the accept loop never
//! blocks on a session.  Many devices can stream scans concurrently — the
//! only global serialization point is the output engine's worker, which is
//! exactly where the spec wants it: injected keystrokes from two devices must
//! never interleave, but their socket I/O may overlap freely.
//!
//! # Failure policy
//!
//! A malformed frame, an unknown action, or a scan sent before the handshake
//! is dropped without terminating the connection — scanners reconnect
//! aggressively and a hard close would turn one bad frame into a flapping
//! session.  Transport errors end only the affected session.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use scanbridge_core::{
    decode_client_message, encode_server_message, ClientMessage, Scan, ServerMessage,
};

use crate::application::track_connections::{ConnectionId, ConnectionState};
use crate::infrastructure::ui_bridge::{AppState, UiEvent};

/// Version string sent in the `helo` reply.
const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Write half of one scanner session.
type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// The scanner-facing intake listener.
pub struct IntakeServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl IntakeServer {
    /// Binds the intake listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is already in use or the process lacks
    /// permission to bind.
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind scan intake listener on {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read intake listener address")?;
        info!("scan intake listening on {local_addr}");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address (useful when binding port 0 in tests).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop until `running` is cleared.
    ///
    /// Each accepted socket is handed to a dedicated Tokio task.  A short
    /// timeout on `accept()` lets the loop observe the shutdown flag even
    /// when no scanners are connecting.  Returning drops the listener, which
    /// releases the port.
    pub async fn run(self, state: Arc<AppState>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping intake accept loop");
                break;
            }

            let accepted = timeout(Duration::from_millis(200), self.listener.accept()).await;
            match accepted {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("incoming scanner connection from {peer_addr}");
                    let state = Arc::clone(&state);
                    let running = Arc::clone(&running);
                    tokio::spawn(async move {
                        handle_scanner_session(stream, peer_addr, state, running).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient accept error (e.g. fd exhaustion); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // Timeout — loop back to check the running flag.
                }
            }
        }
        Ok(())
    }
}

// ── Per-session handling ──────────────────────────────────────────────────────

/// Entry point for each per-session task: registers the connection, runs the
/// session, and guarantees the registry entry is removed afterwards even when
/// the session errored.
async fn handle_scanner_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    running: Arc<AtomicBool>,
) {
    let conn_id = state.registry.lock().await.register();

    match run_session(stream, peer_addr, conn_id, &state, running).await {
        Ok(()) => debug!("scanner session {peer_addr} closed"),
        Err(e) => warn!("scanner session {peer_addr} ended with error: {e:#}"),
    }

    let mut registry = state.registry.lock().await;
    registry.transition(conn_id, ConnectionState::Closed);
    registry.remove(conn_id);
}

/// Runs the complete lifecycle of one scanner session: WebSocket upgrade,
/// handshake, then the frame loop until close or shutdown.
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    conn_id: ConnectionId,
    state: &Arc<AppState>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    state
        .registry
        .lock()
        .await
        .transition(conn_id, ConnectionState::AwaitingHelo);

    // Fire-and-forget: the UI learns about the new device immediately; no
    // reply is expected and an absent UI is fine.
    state.ui.send(UiEvent::ClientConnected);
    debug!("scanner connected from {peer_addr} ({conn_id})");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        if !running.load(Ordering::Relaxed) {
            // Server shutdown: close this session from our side.
            let _ = ws_tx.send(WsMessage::Close(None)).await;
            break;
        }

        // Short timeout so the loop can observe the running flag.
        let frame = match timeout(Duration::from_millis(200), ws_rx.next()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(Err(WsError::ConnectionClosed | WsError::Protocol(_)))) => {
                debug!("scanner {peer_addr}: connection closed");
                break;
            }
            Ok(Some(Err(e))) => {
                warn!("scanner {peer_addr}: transport error: {e}");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => handle_frame(&text, conn_id, &mut ws_tx, state).await,
            WsMessage::Close(_) => {
                debug!("scanner {peer_addr}: close frame received");
                break;
            }
            WsMessage::Binary(_) => {
                // The scanner protocol is JSON text only.
                warn!("scanner {peer_addr}: unexpected binary frame (ignored)");
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {
                // Protocol-level keepalive; tungstenite answers pings itself.
            }
            WsMessage::Frame(_) => debug!("scanner {peer_addr}: raw frame (ignored)"),
        }
    }

    Ok(())
}

// ── Frame dispatch ────────────────────────────────────────────────────────────

/// Decodes and dispatches one text frame.  Malformed frames are dropped
/// silently (debug-logged); they never terminate the session.
async fn handle_frame(raw: &str, conn_id: ConnectionId, ws_tx: &mut WsSink, state: &Arc<AppState>) {
    let message = match decode_client_message(raw) {
        Ok(message) => message,
        Err(e) => {
            debug!("dropping malformed frame from {conn_id}: {e}");
            return;
        }
    };

    match message {
        ClientMessage::Helo { device_name } => {
            handle_helo(device_name, conn_id, ws_tx, state).await;
        }
        ClientMessage::PutScan { scan, scannings } => {
            handle_put_scan(scan, scannings, conn_id, state).await;
        }
        ClientMessage::Unknown { action } => {
            debug!("ignoring unknown action {action:?} from {conn_id}");
        }
    }
}

/// Completes the handshake: stores the device name, activates the connection,
/// and replies with the host version on the same connection.
async fn handle_helo(
    device_name: Option<String>,
    conn_id: ConnectionId,
    ws_tx: &mut WsSink,
    state: &Arc<AppState>,
) {
    let name = device_name.unwrap_or_else(|| "unknown".to_string());
    {
        let mut registry = state.registry.lock().await;
        registry.set_display_name(conn_id, name.clone());
        registry.transition(conn_id, ConnectionState::Active);
    }

    match encode_server_message(&ServerMessage::Helo {
        version: HOST_VERSION.to_string(),
    }) {
        Ok(reply) => {
            if let Err(e) = ws_tx.send(WsMessage::Text(reply)).await {
                warn!("failed to deliver helo reply to {name:?} ({conn_id}): {e}");
            } else {
                info!("scanner {name:?} ({conn_id}) completed handshake");
            }
        }
        Err(e) => error!("failed to encode helo reply: {e}"),
    }
}

/// Processes an accepted scan: UI notification, then the enabled output
/// features against the current settings snapshot.
async fn handle_put_scan(
    scan: Scan,
    scannings: Vec<Scan>,
    conn_id: ConnectionId,
    state: &Arc<AppState>,
) {
    // Scans before a completed handshake are rejected, not queued.  No reply:
    // the scanner retries or reconnects on its own.
    if !state.registry.lock().await.is_active(conn_id) {
        debug!("ignoring putScan from {conn_id} before handshake");
        return;
    }

    state.ui.send(UiEvent::ScanReceived { scan: scan.clone() });

    // One snapshot per scan: a settings update racing this scan either fully
    // applies or fully doesn't.  No settings yet means no output features.
    let Some(settings) = state.settings.snapshot() else {
        debug!("scan received before settings; output features disabled");
        return;
    };

    if settings.enable_realtime_strokes {
        state.engine.enqueue(&scan, &settings);
    }

    if settings.enable_open_in_browser {
        match scannings.first() {
            Some(first) => {
                let url = first.text.clone();
                let opener = Arc::clone(&state.opener);
                // Browser opens are unordered with respect to the keystroke
                // queue and may block in the OS; keep them off this task.
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = opener.open_external(&url) {
                        warn!("failed to open {url:?} in browser: {e}");
                    }
                });
            }
            None => debug!("open-in-browser enabled but the scan carried no scannings"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_version_is_nonempty() {
        assert!(!HOST_VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_bind_on_ephemeral_port_reports_local_addr() {
        let server = IntakeServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind must succeed on an ephemeral port");
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_twice_on_same_port_fails() {
        let first = IntakeServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let result = IntakeServer::bind(first.local_addr()).await;
        assert!(result.is_err(), "second bind on the same port must fail");
    }
}
