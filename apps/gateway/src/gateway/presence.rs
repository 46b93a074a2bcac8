//! In-memory per-connection presence tracking.
//!
//! Presence is per-**connection**: a user with two sockets has two records.
//! The full snapshot is what clients receive as `onlineUsers`.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Status carried in an online record. Connections only exist while online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
}

/// One entry of the `onlineUsers` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnlineStatus {
    #[serde(rename = "socketID")]
    pub connection_id: String,
    /// User ID (`id` on the wire, matching the token claim).
    #[serde(rename = "id")]
    pub user_id: Option<String>,
    pub status: PresenceStatus,
}

struct Entry {
    /// Insertion order, so snapshots list connections oldest first.
    order: u64,
    record: OnlineStatus,
}

/// Thread-safe, DashMap-backed presence tracker keyed by connection ID.
pub struct PresenceTracker {
    inner: DashMap<String, Entry>,
    next_order: AtomicU64,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
            next_order: AtomicU64::new(0),
        }
    }

    /// Mark a connection online. A repeated call for the same connection
    /// replaces its record rather than adding a second one.
    pub fn record_online(&self, connection_id: &str, user_id: Option<&str>) {
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        self.inner.insert(
            connection_id.to_string(),
            Entry {
                order,
                record: OnlineStatus {
                    connection_id: connection_id.to_string(),
                    user_id: user_id.map(str::to_string),
                    status: PresenceStatus::Online,
                },
            },
        );
    }

    /// Drop a connection's record. Returns whether one existed.
    pub fn record_offline(&self, connection_id: &str) -> bool {
        self.inner.remove(connection_id).is_some()
    }

    /// Every online record, oldest connection first.
    pub fn snapshot(&self) -> Vec<OnlineStatus> {
        let mut entries: Vec<(u64, OnlineStatus)> = self
            .inner
            .iter()
            .map(|e| (e.value().order, e.value().record.clone()))
            .collect();
        entries.sort_by_key(|(order, _)| *order);
        entries.into_iter().map(|(_, record)| record).collect()
    }

    /// Whether any connection of `user_id` is online.
    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.inner
            .iter()
            .any(|e| e.value().record.user_id.as_deref() == Some(user_id))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
