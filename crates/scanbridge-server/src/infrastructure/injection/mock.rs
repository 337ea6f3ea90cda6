//! Recording injector for unit and integration tests.
//!
//! Captures every action in order so tests can assert on the exact injected
//! sequence without a windowing system.  Optional per-action delay and
//! failure triggers let tests exercise the engine's serialization and
//! best-effort-continuation behaviour.

use std::sync::Mutex;
use std::time::Duration;

use crate::application::dispatch_output::{InjectionError, InputInjector, UrlOpener};

/// One captured output action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    TypedText(String),
    KeyTap(String),
    OpenedUrl(String),
}

/// An [`InputInjector`]/[`UrlOpener`] that records instead of injecting.
#[derive(Default)]
pub struct RecordingInjector {
    actions: Mutex<Vec<RecordedAction>>,
    fail_on_text: Mutex<Option<String>>,
    delay: Option<Duration>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder that sleeps `delay` inside every action, making
    /// accidental concurrency visible in the recorded order.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Makes `type_text` fail (and record nothing) for this exact text.
    pub fn fail_on_text(&self, text: impl Into<String>) {
        *self.fail_on_text.lock().expect("lock poisoned") = Some(text.into());
    }

    /// Snapshot of everything recorded so far, in execution order.
    pub fn recorded(&self) -> Vec<RecordedAction> {
        self.actions.lock().expect("lock poisoned").clone()
    }

    fn record(&self, action: RecordedAction) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.actions.lock().expect("lock poisoned").push(action);
    }
}

impl InputInjector for RecordingInjector {
    fn type_text(&self, text: &str) -> Result<(), InjectionError> {
        let fail = self
            .fail_on_text
            .lock()
            .expect("lock poisoned")
            .as_deref()
            .is_some_and(|t| t == text);
        if fail {
            return Err(InjectionError::Injector(format!(
                "configured to fail on {text:?}"
            )));
        }
        self.record(RecordedAction::TypedText(text.to_string()));
        Ok(())
    }

    fn key_tap(&self, key: &str) -> Result<(), InjectionError> {
        self.record(RecordedAction::KeyTap(key.to_string()));
        Ok(())
    }
}

impl UrlOpener for RecordingInjector {
    fn open_external(&self, url: &str) -> Result<(), InjectionError> {
        self.record(RecordedAction::OpenedUrl(url.to_string()));
        Ok(())
    }
}
