//! Implementations of the output capabilities.
//!
//! The real keystroke/URL primitives live in the desktop shell that embeds
//! this server; the implementations here cover the headless binary and the
//! test suite:
//!
//! - [`LogOnlyInjector`] / [`LogOnlyUrlOpener`] – record what *would* have
//!   been injected in the structured log.  Used when the server runs without
//!   a desktop shell attached.
//! - [`mock::RecordingInjector`] – captures every action for assertions.

pub mod mock;

use tracing::info;

use crate::application::dispatch_output::{InjectionError, InputInjector, UrlOpener};

/// Injector that logs each action instead of synthesizing OS input.
pub struct LogOnlyInjector;

impl InputInjector for LogOnlyInjector {
    fn type_text(&self, text: &str) -> Result<(), InjectionError> {
        info!("would type: {text:?}");
        Ok(())
    }

    fn key_tap(&self, key: &str) -> Result<(), InjectionError> {
        info!("would press key: {key:?}");
        Ok(())
    }
}

/// URL opener that logs instead of launching a browser.
pub struct LogOnlyUrlOpener;

impl UrlOpener for LogOnlyUrlOpener {
    fn open_external(&self, url: &str) -> Result<(), InjectionError> {
        info!("would open in browser: {url}");
        Ok(())
    }
}
