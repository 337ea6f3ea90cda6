//! LAN discovery advertiser.
//!
//! Scanners find the host without manual IP entry by browsing for an
//! `_http._tcp` service whose instance name is derived from the host name
//! (see `scanbridge_core::domain::announce`).  Two mechanisms exist:
//!
//! 1. **Primary** — register with the platform mDNS/DNS-SD daemon via
//!    `mdns-sd`.  Preferred because every scanner app speaks DNS-SD.
//! 2. **Fallback** — if the daemon cannot be constructed (no multicast route,
//!    container without the service, ...), a background thread periodically
//!    broadcasts a small JSON announcement over UDP carrying the same name
//!    and port.
//!
//! The choice is made once at startup; exactly one mechanism is active per
//! run.  A fallback *publish* failure (socket bind or send) is reported to
//! the UI as a non-fatal warning — the server keeps accepting connections,
//! the user can still type the address into the scanner app.
//!
//! The announcer runs as a plain thread, not a Tokio task, because it is pure
//! blocking socket I/O on a multi-second cadence.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::infrastructure::ui_bridge::{self, UiEvent, UiSink};

/// DNS-SD service type advertised for scanner discovery.
pub const SERVICE_TYPE: &str = "_http._tcp.local.";

/// Error type for advertiser startup.
#[derive(Debug, Error)]
pub enum AdvertiseError {
    /// The platform mDNS daemon could not be constructed or used.
    #[error("mDNS daemon error: {0}")]
    Mdns(#[from] mdns_sd::Error),
    /// A socket operation failed while setting up the fallback publisher.
    #[error("broadcast socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which discovery mechanism is active for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseMechanism {
    /// Platform mDNS/DNS-SD registration.
    Primary,
    /// Periodic UDP broadcast announcements.
    Fallback,
}

/// Settings for the fallback UDP broadcast publisher.
#[derive(Debug, Clone)]
pub struct FallbackAnnounce {
    /// UDP port scanners listen on for broadcast announcements.
    pub broadcast_port: u16,
    /// How often the announcement is re-broadcast.
    pub interval: Duration,
}

impl Default for FallbackAnnounce {
    fn default() -> Self {
        Self {
            broadcast_port: 57892,
            interval: Duration::from_secs(3),
        }
    }
}

/// Handle to the active advertisement.
///
/// Tearing down is idempotent and tolerates a partially failed start: calling
/// [`stop`](Self::stop) on a handle with no live mechanism is a no-op.
pub struct Advertisement {
    instance_name: String,
    service_port: u16,
    mechanism: Option<AdvertiseMechanism>,
    mdns: Option<(ServiceDaemon, String)>,
    stop_flag: Arc<AtomicBool>,
    stopped: bool,
}

impl Advertisement {
    /// The advertised service instance name.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// The intake port the advertisement points scanners at.
    pub fn service_port(&self) -> u16 {
        self.service_port
    }

    /// Which mechanism this handle is keeping alive, if any.
    pub fn mechanism(&self) -> Option<AdvertiseMechanism> {
        self.mechanism
    }

    /// Unpublishes the advertisement.  Safe to call multiple times.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some((daemon, fullname)) = self.mdns.take() {
            let _ = daemon.unregister(&fullname);
            let _ = daemon.shutdown();
        }
        if self.mechanism.is_some() {
            info!("discovery advertisement stopped");
        }
    }

    fn inactive(instance_name: &str, service_port: u16) -> Self {
        Self {
            instance_name: instance_name.to_string(),
            service_port,
            mechanism: None,
            mdns: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            stopped: false,
        }
    }
}

impl Drop for Advertisement {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Startup ───────────────────────────────────────────────────────────────────

/// Starts advertising `instance_name` on `service_port`.
///
/// Never fails: if the primary mechanism is unavailable the fallback is
/// started, and if the fallback cannot publish either, the returned handle is
/// inert and the UI has been warned.
pub fn start_advertiser(
    instance_name: &str,
    service_port: u16,
    announce: FallbackAnnounce,
    ui: &UiSink,
) -> Advertisement {
    match start_mdns(instance_name, service_port) {
        Ok(ad) => {
            info!("advertising {instance_name:?} via mDNS on port {service_port}");
            ad
        }
        Err(e) => {
            warn!("platform mDNS advertisement unavailable ({e}); using UDP broadcast fallback");
            start_fallback(instance_name, service_port, announce, ui)
        }
    }
}

fn start_mdns(instance_name: &str, service_port: u16) -> Result<Advertisement, AdvertiseError> {
    let daemon = ServiceDaemon::new()?;
    let host_name = format!("{}.local.", ui_bridge::hostname());
    // addr-auto keeps the registration current as interfaces change; the
    // explicit address is only the initial seed.
    let ip = ui_bridge::default_address().unwrap_or_else(|| "127.0.0.1".to_string());

    let service_info = ServiceInfo::new(
        SERVICE_TYPE,
        instance_name,
        &host_name,
        ip.as_str(),
        service_port,
        None,
    )?
    .enable_addr_auto();
    let fullname = service_info.get_fullname().to_string();

    daemon.register(service_info)?;

    Ok(Advertisement {
        instance_name: instance_name.to_string(),
        service_port,
        mechanism: Some(AdvertiseMechanism::Primary),
        mdns: Some((daemon, fullname)),
        stop_flag: Arc::new(AtomicBool::new(false)),
        stopped: false,
    })
}

fn start_fallback(
    instance_name: &str,
    service_port: u16,
    announce: FallbackAnnounce,
    ui: &UiSink,
) -> Advertisement {
    let payload = build_announcement(instance_name, service_port);

    let socket = match bind_broadcast_socket() {
        Ok(socket) => socket,
        Err(e) => {
            let message = format!(
                "LAN discovery is unavailable ({e}); scanners must connect by address"
            );
            warn!("{message}");
            ui.send(UiEvent::DiscoveryWarning { message });
            return Advertisement::inactive(instance_name, service_port);
        }
    };

    let stop_flag = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop_flag);
    let thread_ui = ui.clone();
    let interval = announce.interval;
    let broadcast_port = announce.broadcast_port;

    std::thread::Builder::new()
        .name("scanbridge-announce".to_string())
        .spawn(move || {
            announce_loop(socket, payload, broadcast_port, interval, thread_ui, thread_stop);
        })
        .expect("failed to spawn announcer thread");

    info!(
        "fallback publisher broadcasting {instance_name:?} on UDP {broadcast_port} every {:?}",
        interval
    );

    Advertisement {
        instance_name: instance_name.to_string(),
        service_port,
        mechanism: Some(AdvertiseMechanism::Fallback),
        mdns: None,
        stop_flag,
        stopped: false,
    }
}

fn bind_broadcast_socket() -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_broadcast(true)?;
    Ok(socket)
}

/// The periodic broadcast loop executed on the announcer thread.
fn announce_loop(
    socket: UdpSocket,
    payload: String,
    broadcast_port: u16,
    interval: Duration,
    ui: UiSink,
    stop: Arc<AtomicBool>,
) {
    let dest = SocketAddr::from((Ipv4Addr::BROADCAST, broadcast_port));
    let mut warned = false;

    while !stop.load(Ordering::Relaxed) {
        if let Err(e) = socket.send_to(payload.as_bytes(), dest) {
            debug!("broadcast announcement failed: {e}");
            if !warned {
                // Warn once; the server stays up without discoverability.
                warned = true;
                ui.send(UiEvent::DiscoveryWarning {
                    message: format!("announcing the server on the LAN failed: {e}"),
                });
            }
        }
        // Sleep in short slices so stop is honoured promptly.
        let mut slept = Duration::ZERO;
        while slept < interval && !stop.load(Ordering::Relaxed) {
            let slice = Duration::from_millis(250).min(interval - slept);
            std::thread::sleep(slice);
            slept += slice;
        }
    }
    debug!("fallback announcer stopped");
}

/// Builds the JSON announcement datagram.
fn build_announcement(instance_name: &str, service_port: u16) -> String {
    #[derive(Serialize)]
    struct Announcement<'a> {
        name: &'a str,
        #[serde(rename = "type")]
        service_type: &'a str,
        port: u16,
    }
    serde_json::to_string(&Announcement {
        name: instance_name,
        service_type: "http",
        port: service_port,
    })
    .expect("announcement serialization cannot fail")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
