//! File-system storage for the server.
//!
//! Only the server's own runtime configuration lives here.  Scan history and
//! the output settings are owned by the desktop UI and are deliberately not
//! persisted by this process.

pub mod config;
