//! Output action engine: serialized replay of scans as OS input.
//!
//! Two handheld scanners firing within the same few milliseconds must never
//! interleave their keystrokes in the focused application, so every accepted
//! scan is expanded into its full action list up front and the whole batch is
//! queued to a single worker.  The worker executes batches strictly first-in
//! first-out; while one batch runs, later batches wait.
//!
//! The worker runs on a dedicated OS thread rather than a Tokio task because
//! OS-level input injection is synchronous and can be slow (typing a long
//! payload takes real time).  Keeping it off the runtime means a slow
//! injection sequence delays only subsequent scans, never connection
//! accept/read processing.
//!
//! Individual action failures are logged and the rest of the batch continues;
//! a bad `key` name in one template component must not swallow the barcode
//! that follows it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use scanbridge_core::{expand_template, OutputAction, OutputSettings, Scan};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Error type for OS input injection.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// The underlying OS facility rejected the injection.
    #[error("injection failed: {0}")]
    Injector(String),
}

/// OS keystroke injection capability.
///
/// The desktop shell supplies the real implementation; the server only
/// assumes one exists.  Implementations must be callable from a non-async
/// thread and may block while the OS delivers the synthetic events.
pub trait InputInjector: Send + Sync {
    /// Types `text` as literal keystrokes into the focused application.
    fn type_text(&self, text: &str) -> Result<(), InjectionError>;

    /// Presses and releases the named key (e.g. `"enter"`, `"tab"`).
    fn key_tap(&self, key: &str) -> Result<(), InjectionError>;
}

/// OS shell capability for opening a URL in the default browser.
///
/// Deliberately separate from [`InputInjector`]: browser opens are not part
/// of the serialized keystroke queue and carry no ordering guarantee.
pub trait UrlOpener: Send + Sync {
    fn open_external(&self, url: &str) -> Result<(), InjectionError>;
}

/// The output action engine.
///
/// Owns the queue feeding the single worker thread.  Dropping the engine (or
/// calling [`shutdown`](Self::shutdown)) stops the worker; batches still in
/// the queue at that point are abandoned.
pub struct OutputActionEngine {
    queue: mpsc::UnboundedSender<Vec<OutputAction>>,
    stop: Arc<AtomicBool>,
}

impl OutputActionEngine {
    /// Spawns the worker thread and returns the engine handle.
    pub fn start(injector: Arc<dyn InputInjector>) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("scanbridge-output".to_string())
            .spawn(move || worker_loop(rx, injector, worker_stop))
            .expect("failed to spawn output worker thread");

        Self { queue, stop }
    }

    /// Expands `settings`' template against `scan` and queues the resulting
    /// batch for execution.
    ///
    /// The expansion happens here, against the caller's immutable snapshot,
    /// so a settings update arriving after enqueue cannot change what gets
    /// typed.  The call never blocks.
    pub fn enqueue(&self, scan: &Scan, settings: &OutputSettings) {
        let actions = expand_template(&settings.template, scan);
        if actions.is_empty() {
            debug!("template expanded to no actions; nothing queued");
            return;
        }
        if self.queue.send(actions).is_err() {
            warn!("output worker is gone; dropping scan actions");
        }
    }

    /// Stops the worker after the batch it is currently executing.
    /// Queued batches that have not started are abandoned.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// The batch execution loop running on the worker thread.
fn worker_loop(
    mut rx: mpsc::UnboundedReceiver<Vec<OutputAction>>,
    injector: Arc<dyn InputInjector>,
    stop: Arc<AtomicBool>,
) {
    while let Some(batch) = rx.blocking_recv() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        for action in batch {
            let result = match &action {
                OutputAction::TypeText(text) => injector.type_text(text),
                OutputAction::KeyTap(key) => injector.key_tap(key),
            };
            if let Err(e) = result {
                // Best-effort continuation: the rest of the batch still runs.
                error!("output action {action:?} failed: {e}");
            }
        }
    }
    debug!("output worker stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
