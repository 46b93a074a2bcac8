//! Durable store abstractions used by connection teardown and the mail
//! scheduler.
//!
//! Backed by PostgreSQL in production and an in-memory map in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::email::OutboundMessage;

/// Meeting and user records touched when a connection goes away.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Pull `connection_id` out of every meeting's peer list. Returns the
    /// number of meetings that referenced it. Idempotent.
    async fn pull_meeting_peer(&self, connection_id: &str) -> Result<usize, StoreError>;

    /// Stamp the user's last-seen time.
    async fn touch_last_online(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Queue of outbound email drained by the mail scheduler.
#[async_trait]
pub trait MailQueue: Send + Sync {
    /// All messages with `sent = false`, oldest first.
    async fn unsent(&self) -> Result<Vec<OutboundMessage>, StoreError>;

    /// Mark a message delivered. A message that is already sent is left as is.
    async fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}
