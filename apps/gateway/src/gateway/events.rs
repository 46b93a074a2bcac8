//! Gateway wire format: client events, server events, and frames.
//!
//! Every frame is a JSON object `{ "event": <name>, "data": <payload> }`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::presence::OnlineStatus;

/// A serialized server event, shared between all recipients of a broadcast.
pub type Frame = Arc<str>;

/// Outbound queue of one connection.
pub type Outbound = mpsc::Sender<Frame>;

/// Frames buffered per connection before new ones are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// First frame a client sends: `{"event":"handshake","data":{"auth":{"token":"..."}}}`.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeFrame {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: HandshakeData,
}

#[derive(Debug, Default, Deserialize)]
pub struct HandshakeData {
    #[serde(default)]
    pub auth: HandshakeAuth,
}

#[derive(Debug, Default, Deserialize)]
pub struct HandshakeAuth {
    #[serde(default)]
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Client → Server events
// ---------------------------------------------------------------------------

/// Events a client may send once the connection is active.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Enter a room (moving out of any previous one).
    #[serde(rename = "join")]
    Join(RoomPayload),
    /// Leave the current room.
    #[serde(rename = "leave")]
    Leave(RoomPayload),
    #[serde(rename = "newProducer")]
    NewProducer(ProducerPayload),
    #[serde(rename = "removeProducer")]
    RemoveProducer(ProducerPayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => "join",
            ClientEvent::Leave(_) => "leave",
            ClientEvent::NewProducer(_) => "newProducer",
            ClientEvent::RemoveProducer(_) => "removeProducer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomPayload {
    #[serde(rename = "roomID", default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProducerPayload {
    #[serde(rename = "producerID")]
    pub producer_id: String,
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "video".to_string()
}

// ---------------------------------------------------------------------------
// Server → Client events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent to a connection once it is active.
    #[serde(rename = "authenticated")]
    Authenticated {
        #[serde(rename = "socketID")]
        connection_id: String,
    },
    /// Full presence snapshot, sent to everyone.
    #[serde(rename = "onlineUsers")]
    OnlineUsers(Vec<OnlineStatus>),
    /// Current members of a room.
    #[serde(rename = "consumers")]
    Consumers { content: Vec<String>, timestamp: i64 },
    /// A member left the room.
    #[serde(rename = "leave")]
    Leave {
        #[serde(rename = "socketID")]
        connection_id: String,
    },
    #[serde(rename = "newProducer")]
    NewProducer {
        #[serde(rename = "socketID")]
        connection_id: String,
        #[serde(rename = "producerID")]
        producer_id: String,
        kind: String,
    },
    #[serde(rename = "removeProducer")]
    RemoveProducer {
        #[serde(rename = "socketID")]
        connection_id: String,
        #[serde(rename = "producerID")]
        producer_id: String,
    },
    /// Connection-level error (authentication failures).
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    /// Serialize once for fanout.
    pub fn to_frame(&self) -> Frame {
        match serde_json::to_string(self) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(?e, "failed to serialize server event");
                Arc::from("{}")
            }
        }
    }
}
