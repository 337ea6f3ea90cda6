//! UI bridge: the single logical channel between the core and the desktop UI.
//!
//! The UI process is an external collaborator.  Outbound, the core pushes
//! [`UiEvent`]s (client connects, received scans, discovery warnings) through
//! the [`UiSink`]; inbound, the UI calls the command functions at the bottom
//! of this module (`send_settings`, `get_addresses`, ...).
//!
//! # The UI may be absent
//!
//! There is no guarantee a UI is attached when the first scanner connects —
//! the server starts listening immediately.  The sink therefore holds an
//! *optional* sender: events sent while no UI is attached are dropped with a
//! debug log, never queued and never an error.  The same applies in reverse:
//! a scan arriving before the UI has pushed settings simply runs with all
//! output features disabled.
//!
//! # `CommandResult<T>` wrapper
//!
//! Every inbound command returns `CommandResult<T>` rather than `Result<T, E>`
//! so every response has the same `{ success, data, error }` shape and the UI
//! never needs a try/catch around the call.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use scanbridge_core::{OutputSettings, Scan};

use crate::application::dispatch_output::{InputInjector, OutputActionEngine, UrlOpener};
use crate::application::settings_store::SettingsCell;
use crate::application::track_connections::ConnectionRegistry;

// ── Outbound events ───────────────────────────────────────────────────────────

/// Notifications pushed from the core to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// A scanner opened a connection (fired before its handshake).
    ClientConnected,
    /// An accepted scan, forwarded for display/history.
    ScanReceived { scan: Scan },
    /// Non-fatal discovery problem the user should know about (the server
    /// keeps running; the scanner address can still be entered manually).
    DiscoveryWarning { message: String },
}

/// Possibly-absent handle to the UI event channel.
///
/// Cloneable; all clones share the same attachment state.  `send` never
/// blocks: the channel is unbounded and an absent or disappeared UI simply
/// drops the event.
#[derive(Clone, Default)]
pub struct UiSink {
    inner: Arc<Mutex<Option<mpsc::UnboundedSender<UiEvent>>>>,
}

impl UiSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a UI client, replacing any previous attachment, and returns
    /// the receiving end of the event channel.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<UiEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.lock().expect("ui sink lock poisoned") = Some(tx);
        rx
    }

    /// Detaches the current UI client, if any.
    pub fn detach(&self) {
        *self.inner.lock().expect("ui sink lock poisoned") = None;
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().expect("ui sink lock poisoned").is_some()
    }

    /// Fire-and-forget delivery to the UI.
    pub fn send(&self, event: UiEvent) {
        let mut guard = self.inner.lock().expect("ui sink lock poisoned");
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    debug!("UI receiver dropped; detaching");
                    *guard = None;
                }
            }
            None => debug!("no UI attached; dropping {event:?}"),
        }
    }
}

// ── Shared application state ──────────────────────────────────────────────────

/// State shared between the intake server, the UI commands, and `main`.
pub struct AppState {
    /// Current output configuration (UI-owned, snapshot per use).
    pub settings: SettingsCell,
    /// All tracked scanner connections.
    pub registry: tokio::sync::Mutex<ConnectionRegistry>,
    /// Outbound channel to the (possibly absent) UI.
    pub ui: UiSink,
    /// Serialized keystroke output.
    pub engine: OutputActionEngine,
    /// Browser-open capability, independent of the keystroke queue.
    pub opener: Arc<dyn UrlOpener>,
}

impl AppState {
    /// Wires the application state around the supplied OS capabilities.
    pub fn new(injector: Arc<dyn InputInjector>, opener: Arc<dyn UrlOpener>) -> Arc<Self> {
        Arc::new(Self {
            settings: SettingsCell::new(),
            registry: tokio::sync::Mutex::new(ConnectionRegistry::new()),
            ui: UiSink::new(),
            engine: OutputActionEngine::start(injector),
            opener,
        })
    }
}

// ── Inbound commands ──────────────────────────────────────────────────────────

/// Unified response wrapper for UI commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Replaces the output settings wholesale with the UI's new value.
pub async fn send_settings(state: Arc<AppState>, settings: OutputSettings) -> CommandResult<()> {
    state.settings.replace(settings);
    CommandResult::ok(())
}

/// Returns every non-loopback interface address, for display in the UI's
/// "connect manually" dialog.
pub async fn get_addresses(_state: Arc<AppState>) -> CommandResult<Vec<String>> {
    CommandResult::ok(local_addresses())
}

/// Returns the address scanners are most likely to reach: the first private
/// IPv4 interface.
pub async fn get_default_address(_state: Arc<AppState>) -> CommandResult<String> {
    match default_address() {
        Some(addr) => CommandResult::ok(addr),
        None => CommandResult::err("no non-loopback interface address found"),
    }
}

/// Returns the machine's host name.
pub async fn get_hostname(_state: Arc<AppState>) -> CommandResult<String> {
    CommandResult::ok(hostname())
}

// ── Platform helpers ──────────────────────────────────────────────────────────

/// Returns the machine's host name.
///
/// Tries `COMPUTERNAME` (Windows) first, then `HOSTNAME` (Unix), and falls
/// back to the literal string `"scanbridge-host"` if neither is set.
pub fn hostname() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "scanbridge-host".to_string())
}

/// Enumerates all non-loopback interface addresses, IPv4 before IPv6.
pub fn local_addresses() -> Vec<String> {
    let ifaces = match if_addrs::get_if_addrs() {
        Ok(ifaces) => ifaces,
        Err(e) => {
            warn!("failed to enumerate network interfaces: {e}");
            return Vec::new();
        }
    };
    let (v4, v6): (Vec<_>, Vec<_>) = ifaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .map(|iface| iface.ip())
        .partition(|ip| ip.is_ipv4());
    v4.into_iter()
        .chain(v6)
        .map(|ip| ip.to_string())
        .collect()
}

/// Picks the address scanners should try first: a private (RFC 1918) IPv4 if
/// one exists, otherwise the first non-loopback address of any kind.
pub fn default_address() -> Option<String> {
    let addrs = local_addresses();
    addrs
        .iter()
        .find(|addr| {
            addr.parse::<std::net::Ipv4Addr>()
                .map(|ip| ip.is_private())
                .unwrap_or(false)
        })
        .or_else(|| addrs.first())
        .cloned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
