use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use clover_common::id::{prefix, PrefixedId};

use crate::db::schema::emails;

/// A queued outbound email. Rows are created by other services; the gateway
/// only flips `sent` and stamps `date_sent`.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = emails)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboundMessage {
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: String,
    pub html: String,
    pub sent: bool,
    pub date_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboundMessage {
    /// Build an unsent message. Used by callers that enqueue mail in-process.
    pub fn unsent(from: &str, to: &str, subject: &str, html: &str) -> Self {
        Self {
            id: Self::generate(),
            from_address: from.to_string(),
            to_address: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
            sent: false,
            date_sent: None,
            created_at: Utc::now(),
        }
    }
}

impl PrefixedId for OutboundMessage {
    const PREFIX: &'static str = prefix::MAIL;
}
