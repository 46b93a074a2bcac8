//! PostgreSQL implementation of the durable store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;

use crate::db::pool::DbPool;
use crate::db::schema::{emails, users};
use crate::db::store::{DurableStore, MailQueue};
use crate::error::StoreError;
use crate::models::email::OutboundMessage;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableStore for PgStore {
    async fn pull_meeting_peer(&self, connection_id: &str) -> Result<usize, StoreError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::sql_query(
            "UPDATE meetings SET peers = array_remove(peers, $1) WHERE $1 = ANY(peers)",
        )
        .bind::<Text, _>(connection_id)
        .execute(&mut conn)
        .await?;

        Ok(updated)
    }

    async fn touch_last_online(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(users::table.find(user_id))
            .set(users::last_online.eq(Some(at)))
            .execute(&mut conn)
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }
}

#[async_trait]
impl MailQueue for PgStore {
    async fn unsent(&self) -> Result<Vec<OutboundMessage>, StoreError> {
        let mut conn = self.pool.get().await?;

        let rows = emails::table
            .filter(emails::sent.eq(false))
            .order(emails::created_at.asc())
            .select(OutboundMessage::as_select())
            .load(&mut conn)
            .await?;

        Ok(rows)
    }

    async fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;

        diesel::update(emails::table.find(id).filter(emails::sent.eq(false)))
            .set((emails::sent.eq(true), emails::date_sent.eq(Some(at))))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}
