//! ScanBridge server — entry point.
//!
//! Wires together the infrastructure services and starts the Tokio runtime.
//! Handheld scanner apps on the LAN discover this process (mDNS, with a UDP
//! broadcast fallback), connect over WebSocket, and stream scan events; the
//! server replays accepted scans as keystrokes through the configured
//! injector and notifies the desktop UI.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML config, CLI/env overrides
//!  └─ AppState::new()        -- settings cell, registry, UI sink, output engine
//!  └─ start services
//!       ├─ Advertisement     (mDNS daemon, or UDP announcer thread)
//!       ├─ IntakeServer      (Tokio accept loop + per-scanner tasks)
//!       └─ output worker     (dedicated thread, spawned by AppState)
//! ```
//!
//! This binary runs headless: injected output and UI events go to the
//! structured log.  The desktop shell embeds the same library crate and
//! supplies real `InputInjector`/`UrlOpener` implementations plus a UI
//! attached to the [`UiSink`](scanbridge_server::infrastructure::ui_bridge::UiSink).

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scanbridge_core::service_instance_name;
use scanbridge_server::infrastructure::injection::{LogOnlyInjector, LogOnlyUrlOpener};
use scanbridge_server::infrastructure::network::advertiser::{
    start_advertiser, FallbackAnnounce,
};
use scanbridge_server::infrastructure::network::intake::IntakeServer;
use scanbridge_server::infrastructure::storage::config::load_config;
use scanbridge_server::infrastructure::ui_bridge::{hostname, AppState};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// ScanBridge server.
///
/// Receives barcode/QR scans from handheld devices on the local network and
/// replays them as keystrokes into the focused application.
#[derive(Debug, Parser)]
#[command(name = "scanbridge-server", version, about)]
struct Cli {
    /// Intake port scanners connect to.
    #[arg(long, env = "SCANBRIDGE_PORT")]
    port: Option<u16>,

    /// IP address to bind to.
    #[arg(long, env = "SCANBRIDGE_BIND")]
    bind: Option<String>,

    /// Disable LAN discovery advertising entirely.
    #[arg(long, default_value_t = false)]
    no_discovery: bool,

    /// Log level override (error, warn, info, debug, trace).
    #[arg(long, env = "SCANBRIDGE_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config file first, CLI/env overrides second.
    let mut config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("warning: could not load config ({e}); using defaults");
            Default::default()
        }
    };
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(bind) = cli.bind {
        config.network.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.server.log_level = level;
    }

    // Structured logging.  `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    info!("ScanBridge server {} starting", env!("CARGO_PKG_VERSION"));

    let bind_addr: SocketAddr = format!("{}:{}", config.network.bind_address, config.network.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {:?} / port {}",
                config.network.bind_address, config.network.port
            )
        })?;

    // Shared state: settings cell, connection registry, UI sink, output engine.
    // The headless binary injects log-only output capabilities.
    let state = AppState::new(Arc::new(LogOnlyInjector), Arc::new(LogOnlyUrlOpener));

    // Drain UI events into the log so a headless run still shows activity.
    let mut ui_rx = state.ui.attach();
    tokio::spawn(async move {
        while let Some(event) = ui_rx.recv().await {
            info!("ui event: {event:?}");
        }
    });

    // Shutdown flag shared across all services.
    let running = Arc::new(AtomicBool::new(true));

    // ── Discovery advertiser ──────────────────────────────────────────────────
    let mut advertisement = if cli.no_discovery {
        info!("discovery disabled by --no-discovery");
        None
    } else {
        let instance_name = service_instance_name(&hostname());
        Some(start_advertiser(
            &instance_name,
            config.network.port,
            FallbackAnnounce {
                broadcast_port: config.network.announce_port,
                interval: Duration::from_secs(config.network.announce_interval_secs),
            },
            &state.ui,
        ))
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_signal = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_signal.store(false, Ordering::Relaxed);
        }
    });

    // ── Intake server ─────────────────────────────────────────────────────────
    let server = IntakeServer::bind(bind_addr).await?;
    info!(
        "ready; scanners can connect to port {}",
        server.local_addr().port()
    );

    let run_result = server.run(Arc::clone(&state), Arc::clone(&running)).await;
    if let Err(e) = &run_result {
        warn!("intake server ended with error: {e:#}");
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    // Best-effort, in order: sessions observe the cleared flag and close, the
    // advertisement is unpublished, the output worker stops.  Each step runs
    // regardless of earlier failures; dropping the server released the port.
    if let Some(ad) = advertisement.as_mut() {
        ad.stop();
    }
    state.engine.shutdown();

    info!("ScanBridge server stopped");
    run_result
}
