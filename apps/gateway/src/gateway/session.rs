//! The gateway context: registries, collaborators, and the connection
//! lifecycle operations that keep them consistent.

use std::sync::Arc;

use crate::auth::credential::Credentials;
use crate::auth::tokens;
use crate::db::peers::PeerStore;
use crate::db::store::DurableStore;
use crate::error::{ConnectError, LifecycleError};

use super::connection::{Connection, ConnectionState};
use super::events::{ClientEvent, Outbound, ServerEvent};
use super::fanout::Fanout;
use super::handler;
use super::media::{MediaCapability, MediaPeer};
use super::presence::PresenceTracker;
use super::registry::ConnectionRegistry;
use super::rooms::RoomTracker;
use super::teardown::{self, TeardownReport};

/// Shared gateway state. Built once at startup and handed to every
/// connection task; tests build their own isolated instances.
pub struct Gateway {
    secret: String,
    pub registry: Arc<ConnectionRegistry>,
    pub presence: PresenceTracker,
    pub rooms: Arc<RoomTracker>,
    pub fanout: Fanout,
    pub store: Arc<dyn DurableStore>,
    pub peers: Arc<dyn PeerStore>,
    media: Option<Arc<dyn MediaCapability>>,
}

impl Gateway {
    pub fn new(
        secret: impl Into<String>,
        store: Arc<dyn DurableStore>,
        peers: Arc<dyn PeerStore>,
        media: Option<Arc<dyn MediaCapability>>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomTracker::new());
        Self {
            secret: secret.into(),
            fanout: Fanout::new(registry.clone(), rooms.clone()),
            registry,
            presence: PresenceTracker::new(),
            rooms,
            store,
            peers,
            media,
        }
    }

    /// Start tracking a new transport connection. Touches no registry.
    pub fn open(&self, connection_id: String) -> Arc<Connection> {
        tracing::debug!(%connection_id, "connection opened");
        Arc::new(Connection::new(connection_id))
    }

    /// Verify the handshake credential and attach its claims.
    ///
    /// On a credential failure the connection is terminated and no registry
    /// is touched. A connection that is not freshly opened is left as is and
    /// reported as a lifecycle error.
    pub fn authenticate(&self, conn: &Connection, credentials: &Credentials) -> Result<(), ConnectError> {
        conn.transition(ConnectionState::Authenticating)?;

        let verified = credentials
            .resolve()
            .and_then(|token| tokens::verify_token(token, &self.secret));

        match verified {
            Ok(claims) => {
                conn.attach_claims(claims);
                Ok(())
            }
            Err(e) => {
                tracing::info!(connection_id = %conn.id, reason = %e, "handshake rejected");
                let _ = conn.transition(ConnectionState::Terminated);
                Err(e.into())
            }
        }
    }

    /// Bring an authenticated connection online: register it, mark it
    /// present, and broadcast the new presence snapshot.
    pub fn activate(&self, conn: &Arc<Connection>, outbound: Outbound) -> Result<(), LifecycleError> {
        conn.transition(ConnectionState::Active)?;

        self.init_media(conn);

        let user_id = conn.user_id();
        self.registry.register(&conn.id, user_id, outbound);
        self.presence.record_online(&conn.id, user_id);

        self.fanout.to_connection(
            &conn.id,
            &ServerEvent::Authenticated {
                connection_id: conn.id.clone(),
            },
        );
        self.broadcast_presence();

        tracing::info!(
            connection_id = %conn.id,
            user = %conn.label(),
            online = self.presence.len(),
            "connection active"
        );
        Ok(())
    }

    /// `open` + `authenticate` + `activate` in one call.
    pub fn connect(
        &self,
        connection_id: String,
        credentials: &Credentials,
        outbound: Outbound,
    ) -> Result<Arc<Connection>, ConnectError> {
        let conn = self.open(connection_id);
        self.authenticate(&conn, credentials)?;
        self.activate(&conn, outbound)?;
        Ok(conn)
    }

    /// Handle one inbound event. Ignored unless the connection is active.
    pub async fn dispatch(&self, conn: &Connection, event: ClientEvent) {
        if !conn.is_active() {
            tracing::debug!(connection_id = %conn.id, state = ?conn.state(), "event on inactive connection dropped");
            return;
        }
        handler::dispatch(self, conn, event).await;
    }

    /// Put a connection in a room and broadcast the room's members. Leaving a
    /// previous room is announced there first.
    pub fn join_room(&self, connection_id: &str, room_id: &str) {
        if let Some(previous) = self.rooms.add(room_id, connection_id) {
            self.announce_leave(&previous, connection_id);
        }
        self.broadcast_consumers(room_id, None);
        tracing::debug!(%connection_id, %room_id, "joined room");
    }

    /// Take a connection out of `room_id` (or its current room) and tell the
    /// remaining members. Returns the room left, if any.
    pub fn leave_room(&self, connection_id: &str, room_id: Option<&str>) -> Option<String> {
        let room_id = match room_id {
            Some(room_id) => room_id.to_string(),
            None => self.rooms.room_of(connection_id)?,
        };
        if !self.rooms.remove(&room_id, connection_id) {
            return None;
        }
        self.announce_leave(&room_id, connection_id);
        tracing::debug!(%connection_id, %room_id, "left room");
        Some(room_id)
    }

    /// Tear down an active connection. Only the first call per connection
    /// does anything; later calls (and calls for connections that never
    /// became active) return `None`.
    pub async fn disconnect(self: &Arc<Self>, conn: &Arc<Connection>) -> Option<TeardownReport> {
        if conn.transition(ConnectionState::Disconnecting).is_err() {
            if matches!(
                conn.state(),
                ConnectionState::Connecting | ConnectionState::Authenticating
            ) {
                let _ = conn.transition(ConnectionState::Terminated);
            }
            return None;
        }

        // Spawned so the steps finish even if the caller's task is dropped.
        let gateway = Arc::clone(self);
        let task_conn = Arc::clone(conn);
        let task = tokio::spawn(async move { teardown::run(&gateway, &task_conn).await });

        match task.await {
            Ok(report) => {
                tracing::info!(
                    connection_id = %conn.id,
                    user = %conn.label(),
                    failed_steps = report.failed.len(),
                    "connection terminated"
                );
                Some(report)
            }
            Err(e) => {
                tracing::error!(connection_id = %conn.id, ?e, "teardown task failed");
                None
            }
        }
    }

    /// Send the full online snapshot to every connection.
    pub fn broadcast_presence(&self) {
        let snapshot = self.presence.snapshot();
        self.fanout.to_all(&ServerEvent::OnlineUsers(snapshot));
    }

    /// True when no connection state is held anywhere.
    pub fn is_idle(&self) -> bool {
        self.registry.is_empty() && self.presence.is_empty() && self.rooms.is_empty()
    }

    fn announce_leave(&self, room_id: &str, connection_id: &str) {
        self.broadcast_consumers(room_id, Some(connection_id));
        self.fanout.to_room(
            room_id,
            &ServerEvent::Leave {
                connection_id: connection_id.to_string(),
            },
            Some(connection_id),
        );
    }

    fn broadcast_consumers(&self, room_id: &str, except: Option<&str>) {
        let event = ServerEvent::Consumers {
            content: self.rooms.members_of(room_id),
            timestamp: clover_common::time::now_millis(),
        };
        self.fanout.to_room(room_id, &event, except);
    }

    /// Fire-and-forget media setup. Errors are logged, never propagated.
    fn init_media(&self, conn: &Connection) {
        let Some(media) = self.media.clone() else {
            return;
        };
        let peer = MediaPeer {
            connection_id: conn.id.clone(),
            user_id: conn.user_id().map(str::to_string),
        };
        tokio::spawn(async move {
            if let Err(e) = media.init_connection(&peer).await {
                tracing::error!(connection_id = %peer.connection_id, error = %e, "media init failed");
            }
        });
    }
}
