//! Scanner wire protocol.
//!
//! # Sub-modules
//!
//! - **`messages`** – Typed message structs exchanged between scanner and host,
//!   plus the [`Scan`](messages::Scan) payload itself.
//!
//! - **`codec`** – Decodes one JSON text frame into a
//!   [`ClientMessage`](messages::ClientMessage) and encodes host replies.
//!   Unknown actions decode to an `Unknown` variant so the server can skip
//!   them without treating the frame as an error.

pub mod codec;
pub mod messages;
