//! Pure domain logic: no I/O, no OS calls, no sockets.
//!
//! # Sub-modules
//!
//! - **`settings`** – The output configuration the desktop UI pushes to the
//!   server: feature toggles plus the ordered output template.
//!
//! - **`template`** – Expands a template against a received scan into the
//!   ordered list of concrete output actions the injection worker executes.
//!
//! - **`announce`** – Derivation of the LAN-discovery service name from the
//!   host name.  Kept here because existing scanner apps match on the derived
//!   name prefix, so the function must stay byte-for-byte stable.

pub mod announce;
pub mod settings;
pub mod template;
