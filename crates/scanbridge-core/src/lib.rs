//! # scanbridge-core
//!
//! Shared library for ScanBridge containing the scanner wire protocol, the
//! scan/settings domain model, and the output template engine.
//!
//! This crate is used by the server and by any future native client tooling.
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets.
//!
//! ScanBridge lets handheld scanning devices on the same LAN stream barcode/QR
//! scan events to a desktop host.  The host can replay each scan, wrapped in a
//! user-defined template, as keystrokes into whatever application currently has
//! OS focus.  This crate defines:
//!
//! - **`protocol`** – How messages travel over the wire.  Every frame is one
//!   UTF-8 JSON envelope `{"action": ..., "data": {...}}`; the codec decodes
//!   frames into typed messages and encodes host replies.
//!
//! - **`domain`** – Pure business logic with no I/O: the output settings and
//!   template model, template-to-action expansion, and the service-name
//!   derivation used by LAN discovery.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `scanbridge_core::Scan` instead of `scanbridge_core::protocol::messages::Scan`.
pub use domain::announce::{derive_service_suffix, service_instance_name, PRODUCT_NAME};
pub use domain::settings::{OutputSettings, TemplateComponent};
pub use domain::template::{expand_template, OutputAction};
pub use protocol::codec::{decode_client_message, encode_server_message, DecodeError};
pub use protocol::messages::{ClientMessage, Scan, ServerMessage};
