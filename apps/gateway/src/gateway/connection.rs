//! Per-connection state and the lifecycle state machine.

use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::Serialize;

use crate::auth::tokens::Claims;
use crate::error::LifecycleError;

/// Lifecycle of one gateway connection.
///
/// `Connecting → Authenticating → Active → Disconnecting → Terminated`, with
/// `Authenticating → Terminated` on a rejected handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Active,
    Disconnecting,
    Terminated,
}

impl ConnectionState {
    fn can_move_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Connecting, Terminated)
                | (Authenticating, Active)
                | (Authenticating, Terminated)
                | (Active, Disconnecting)
                | (Disconnecting, Terminated)
        )
    }
}

/// A single live socket. Owned by the gateway; registries refer to it by ID.
#[derive(Debug)]
pub struct Connection {
    /// Transport-assigned connection ID (`cn_` prefixed ULID).
    pub id: String,
    /// Set once when the token verifies.
    claims: OnceLock<Claims>,
    state: Mutex<ConnectionState>,
}

impl Connection {
    pub fn new(id: String) -> Self {
        Self {
            id,
            claims: OnceLock::new(),
            state: Mutex::new(ConnectionState::Connecting),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Move to `next`, failing if the edge is not part of the lifecycle.
    /// The check and the write happen under one lock, so two callers racing
    /// for the same edge see exactly one success.
    pub fn transition(&self, next: ConnectionState) -> Result<(), LifecycleError> {
        let mut state = self.state.lock();
        if !state.can_move_to(next) {
            return Err(LifecycleError {
                from: *state,
                to: next,
            });
        }
        *state = next;
        Ok(())
    }

    pub(crate) fn attach_claims(&self, claims: Claims) {
        // Only reachable once per connection (Authenticating happens once).
        let _ = self.claims.set(claims);
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.get()
    }

    /// User ID from the verified claims, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.claims.get().and_then(|c| c.id.as_deref())
    }

    /// Name used in log lines.
    pub fn label(&self) -> &str {
        self.claims
            .get()
            .map(|c| c.display_name())
            .unwrap_or(self.id.as_str())
    }
}
