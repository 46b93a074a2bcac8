//! Delivery of server events to connections.
//!
//! Recipients are resolved against the registries at send time and each gets
//! the same serialized frame through its bounded outbound queue. Delivery is
//! best-effort: a full or closed queue drops the frame for that connection
//! only.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use super::events::{Frame, ServerEvent};
use super::registry::ConnectionRegistry;
use super::rooms::RoomTracker;

/// Event fanout over the connection registry and room tracker.
#[derive(Clone)]
pub struct Fanout {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTracker>,
}

impl Fanout {
    pub fn new(registry: Arc<ConnectionRegistry>, rooms: Arc<RoomTracker>) -> Self {
        Self { registry, rooms }
    }

    /// Send to one connection. Returns whether the frame was queued.
    pub fn to_connection(&self, connection_id: &str, event: &ServerEvent) -> bool {
        self.deliver(connection_id, &event.to_frame())
    }

    /// Send to every connection of a user (the user's private channel).
    pub fn to_user(&self, user_id: &str, event: &ServerEvent) -> usize {
        let frame = event.to_frame();
        self.deliver_all(self.registry.connections_of(user_id), &frame, None)
    }

    /// Send to every member of a room, optionally skipping one connection.
    pub fn to_room(&self, room_id: &str, event: &ServerEvent, except: Option<&str>) -> usize {
        let frame = event.to_frame();
        self.deliver_all(self.rooms.members_of(room_id), &frame, except)
    }

    /// Send to every registered connection.
    pub fn to_all(&self, event: &ServerEvent) -> usize {
        let frame = event.to_frame();
        self.deliver_all(self.registry.connection_ids(), &frame, None)
    }

    fn deliver_all(&self, ids: Vec<String>, frame: &Frame, except: Option<&str>) -> usize {
        ids.iter()
            .filter(|id| Some(id.as_str()) != except)
            .filter(|id| self.deliver(id, frame))
            .count()
    }

    fn deliver(&self, connection_id: &str, frame: &Frame) -> bool {
        let Some(handle) = self.registry.handle(connection_id) else {
            return false;
        };
        match handle.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%connection_id, "outbound queue full, dropping frame");
                false
            }
            // Socket task already gone; teardown will unregister it.
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
