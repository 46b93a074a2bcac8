use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::db::store::{DurableStore, MailQueue};
use crate::error::StoreError;
use crate::models::email::OutboundMessage;

// ---------------------------------------------------------------------------
// In-memory implementation (no DATABASE_URL / tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    /// user id -> last online
    users: HashMap<String, Option<DateTime<Utc>>>,
    /// meeting id -> peer connection ids
    meetings: HashMap<String, Vec<String>>,
    /// Insertion-ordered mail queue.
    emails: Vec<OutboundMessage>,
}

/// In-memory stand-in for the database.
///
/// `set_unavailable(true)` makes every operation fail, which lets tests
/// exercise the partial-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    pub fn insert_user(&self, user_id: &str) {
        self.tables.lock().users.insert(user_id.to_string(), None);
    }

    pub fn last_online(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.tables.lock().users.get(user_id).copied().flatten()
    }

    pub fn insert_meeting(&self, meeting_id: &str, peers: &[&str]) {
        self.tables.lock().meetings.insert(
            meeting_id.to_string(),
            peers.iter().map(|p| p.to_string()).collect(),
        );
    }

    pub fn meeting_peers(&self, meeting_id: &str) -> Vec<String> {
        self.tables
            .lock()
            .meetings
            .get(meeting_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn enqueue(&self, message: OutboundMessage) {
        self.tables.lock().emails.push(message);
    }

    pub fn message(&self, id: &str) -> Option<OutboundMessage> {
        self.tables.lock().emails.iter().find(|m| m.id == id).cloned()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn pull_meeting_peer(&self, connection_id: &str) -> Result<usize, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock();
        let mut updated = 0;
        for peers in tables.meetings.values_mut() {
            let before = peers.len();
            peers.retain(|p| p != connection_id);
            if peers.len() != before {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn touch_last_online(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check()?;
        match self.tables.lock().users.get_mut(user_id) {
            Some(last_online) => {
                *last_online = Some(at);
                Ok(())
            }
            None => Err(StoreError::NotFound("user")),
        }
    }
}

#[async_trait]
impl MailQueue for MemoryStore {
    async fn unsent(&self) -> Result<Vec<OutboundMessage>, StoreError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .emails
            .iter()
            .filter(|m| !m.sent)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.lock();
        let message = tables
            .emails
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound("email"))?;
        if !message.sent {
            message.sent = true;
            message.date_sent = Some(at);
        }
        Ok(())
    }
}
