//! Infrastructure layer for the server.
//!
//! Contains OS-facing adapters: network sockets, LAN discovery, injection
//! capabilities, file-system storage, and the UI command bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `scanbridge_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod injection;
pub mod network;
pub mod storage;
pub mod ui_bridge;
