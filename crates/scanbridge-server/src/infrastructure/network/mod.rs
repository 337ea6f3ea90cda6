//! Network infrastructure for the server.
//!
//! # Sub-modules
//!
//! - **`intake`** – The scanner-facing WebSocket server: accept loop,
//!   per-connection read loop, handshake handling, and the wiring between
//!   codec, registry, settings snapshot, output engine, and UI sink.
//!
//! - **`advertiser`** – Makes the host discoverable on the LAN.  Tries the
//!   platform mDNS daemon first and falls back to a periodic UDP broadcast
//!   publisher advertising the same name and port.

pub mod advertiser;
pub mod intake;
