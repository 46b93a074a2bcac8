use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

use crate::error::StoreError;

/// A media producer registered by a connection inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerRecord {
    #[serde(rename = "socketID")]
    pub connection_id: String,
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "producerID")]
    pub producer_id: String,
    pub kind: String,
}

/// Short-lived per-connection peer records. Never persisted.
#[async_trait]
pub trait PeerStore: Send + Sync {
    async fn insert(&self, record: PeerRecord) -> Result<(), StoreError>;
    /// Remove a single producer. Returns the removed record, if any.
    async fn remove_producer(
        &self,
        connection_id: &str,
        producer_id: &str,
    ) -> Result<Option<PeerRecord>, StoreError>;
    /// Remove every record owned by the connection. Returns how many went.
    async fn remove_connection(&self, connection_id: &str) -> Result<usize, StoreError>;
    async fn in_room(&self, room_id: &str) -> Result<Vec<PeerRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Peer records keyed by connection ID.
#[derive(Default)]
pub struct MemoryPeerStore {
    peers: DashMap<String, Vec<PeerRecord>>,
    unavailable: AtomicBool,
}

impl MemoryPeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.peers.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("peer store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerStore for MemoryPeerStore {
    async fn insert(&self, record: PeerRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut entry = self.peers.entry(record.connection_id.clone()).or_default();
        entry.retain(|r| r.producer_id != record.producer_id);
        entry.push(record);
        Ok(())
    }

    async fn remove_producer(
        &self,
        connection_id: &str,
        producer_id: &str,
    ) -> Result<Option<PeerRecord>, StoreError> {
        self.check()?;
        let removed = self.peers.get_mut(connection_id).and_then(|mut records| {
            let idx = records.iter().position(|r| r.producer_id == producer_id)?;
            Some(records.remove(idx))
        });
        self.peers.remove_if(connection_id, |_, records| records.is_empty());
        Ok(removed)
    }

    async fn remove_connection(&self, connection_id: &str) -> Result<usize, StoreError> {
        self.check()?;
        Ok(self
            .peers
            .remove(connection_id)
            .map(|(_, records)| records.len())
            .unwrap_or(0))
    }

    async fn in_room(&self, room_id: &str) -> Result<Vec<PeerRecord>, StoreError> {
        self.check()?;
        Ok(self
            .peers
            .iter()
            .flat_map(|e| e.value().clone())
            .filter(|r| r.room_id == room_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(conn: &str, room: &str, producer: &str) -> PeerRecord {
        PeerRecord {
            connection_id: conn.to_string(),
            room_id: room.to_string(),
            producer_id: producer.to_string(),
            kind: "audio".to_string(),
        }
    }

    #[tokio::test]
    async fn remove_connection_drops_all_records() {
        let store = MemoryPeerStore::new();
        store.insert(record("c1", "r1", "p1")).await.unwrap();
        store.insert(record("c1", "r1", "p2")).await.unwrap();
        store.insert(record("c2", "r1", "p3")).await.unwrap();

        assert_eq!(store.remove_connection("c1").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        // Idempotent.
        assert_eq!(store.remove_connection("c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reinserting_producer_replaces_it() {
        let store = MemoryPeerStore::new();
        store.insert(record("c1", "r1", "p1")).await.unwrap();
        store.insert(record("c1", "r2", "p1")).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.in_room("r2").await.unwrap().len(), 1);
        assert!(store.in_room("r1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_producer_cleans_empty_entry() {
        let store = MemoryPeerStore::new();
        store.insert(record("c1", "r1", "p1")).await.unwrap();

        let removed = store.remove_producer("c1", "p1").await.unwrap();
        assert_eq!(removed.unwrap().producer_id, "p1");
        assert!(store.is_empty());
        assert!(store.remove_producer("c1", "p1").await.unwrap().is_none());
    }
}
