//! Connection registry: bookkeeping for live scanner connections.
//!
//! The registry is the server's in-memory record of every socket it has
//! accepted.  Each entry tracks the connection's id, the device name learned
//! from the handshake, and where it is in the lifecycle:
//!
//! ```text
//! Connecting  ──►  AwaitingHelo  ──►  Active  ──►  Closed
//! ```
//!
//! - `Connecting`: the TCP socket was accepted; the WebSocket upgrade is in
//!   progress.
//! - `AwaitingHelo`: the transport is up; no handshake message yet.  Scans
//!   received in this state are rejected, not queued.
//! - `Active`: the handshake completed; scans are accepted.
//! - `Closed`: the socket is gone; the entry is about to be removed.
//!
//! The registry does no I/O.  It is owned by the intake server and shared
//! with the UI bridge behind a mutex.  Ids are UUIDv4, unique for the process
//! lifetime — an id is never reissued, so a stale id held by a logging task
//! can never accidentally refer to a newer connection.

use std::collections::HashMap;

use uuid::Uuid;

/// Opaque handle identifying one scanner connection.
pub type ConnectionId = Uuid;

/// Lifecycle state of a scanner connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted; transport handshake in progress.
    Connecting,
    /// Transport up; waiting for the `helo` message.
    AwaitingHelo,
    /// Handshake complete; scans are accepted.
    Active,
    /// Socket closed; entry pending removal.
    Closed,
}

impl ConnectionState {
    /// Position in the forward-only lifecycle, used to reject regressions.
    fn rank(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::AwaitingHelo => 1,
            Self::Active => 2,
            Self::Closed => 3,
        }
    }
}

/// One tracked scanner connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    /// Device label from the handshake; `"unknown"` until `helo` arrives.
    pub display_name: String,
    pub state: ConnectionState,
}

/// In-memory registry of all tracked connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted socket and returns its id.
    pub fn register(&mut self) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            Connection {
                id,
                display_name: "unknown".to_string(),
                state: ConnectionState::Connecting,
            },
        );
        id
    }

    /// Advances a connection to `new_state`.
    ///
    /// The lifecycle is forward-only: a transition that would move backwards
    /// (e.g. `Active` → `AwaitingHelo`) is ignored.  Returns `true` if the
    /// state was updated.
    pub fn transition(&mut self, id: ConnectionId, new_state: ConnectionState) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) if new_state.rank() > conn.state.rank() => {
                conn.state = new_state;
                true
            }
            _ => false,
        }
    }

    /// Stores the device name learned from the handshake.
    pub fn set_display_name(&mut self, id: ConnectionId, name: impl Into<String>) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.display_name = name.into();
        }
    }

    /// Removes a connection.  Safe to call any number of times for the same id.
    pub fn remove(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    /// Returns the tracked state for `id`, if still registered.
    pub fn lookup(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// `true` when `id` is registered and has completed its handshake.
    pub fn is_active(&self, id: ConnectionId) -> bool {
        matches!(
            self.lookup(id),
            Some(Connection {
                state: ConnectionState::Active,
                ..
            })
        )
    }

    /// Snapshot of all tracked connections.
    pub fn all(&self) -> Vec<Connection> {
        self.connections.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
