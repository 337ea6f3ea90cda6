//! Application layer use cases for the server.
//!
//! Use cases orchestrate domain objects to fulfil one goal each, depend on
//! traits rather than concrete OS facilities, and contain no network I/O or
//! file-system access themselves.
//!
//! # Sub-modules
//!
//! - **`track_connections`** – In-memory registry of scanner connections and
//!   their handshake state machine.  Pure bookkeeping, exclusively driven by
//!   the intake server.
//!
//! - **`settings_store`** – Single-writer / multi-reader snapshot cell holding
//!   the current output configuration pushed by the UI.
//!
//! - **`dispatch_output`** – Turns an accepted scan into a serialized sequence
//!   of OS output actions.  This is the only place that touches the OS input
//!   layer, and it does so through the [`InputInjector`](dispatch_output::InputInjector)
//!   trait behind a single worker so concurrent scans can never interleave
//!   their keystrokes.

pub mod dispatch_output;
pub mod settings_store;
pub mod track_connections;
