//! Snapshot cell for the UI-owned output settings.
//!
//! The desktop UI is the single writer: every `sendSettings` replaces the
//! value wholesale.  Readers (the intake path, the output engine) take an
//! `Arc` snapshot per use, so a settings update arriving mid-scan can never
//! tear the template a running expansion is reading.
//!
//! Before the UI has sent anything the cell is empty, which callers treat as
//! "all output features disabled".

use std::sync::{Arc, RwLock};

use scanbridge_core::OutputSettings;

/// Single-writer / multi-reader cell holding the current [`OutputSettings`].
#[derive(Clone, Default)]
pub struct SettingsCell {
    inner: Arc<RwLock<Option<Arc<OutputSettings>>>>,
}

impl SettingsCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored settings wholesale.
    pub fn replace(&self, settings: OutputSettings) {
        let mut guard = self.inner.write().expect("settings lock poisoned");
        *guard = Some(Arc::new(settings));
    }

    /// Returns the current snapshot, or `None` if the UI has not sent
    /// settings yet.  The snapshot stays valid even if the UI replaces the
    /// settings while the caller is still using it.
    pub fn snapshot(&self) -> Option<Arc<OutputSettings>> {
        self.inner.read().expect("settings lock poisoned").clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
