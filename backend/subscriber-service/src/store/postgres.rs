use async_trait::async_trait;
use cursor_codec::PageRequest;
use error_types::ServiceResult;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{SubscriptionStore, SubscriptionTx};
use crate::models::SubscriberRow;

/// PostgreSQL membership store
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn begin(&self) -> ServiceResult<Box<dyn SubscriptionTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSubscriptionTx { tx }))
    }

    async fn active_channels(&self, user_id: &str) -> ServiceResult<Vec<String>> {
        let channels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT channel
            FROM subscriptions
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY channel
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    async fn list_subscriber_page(
        &self,
        channels: &[String],
        page: &PageRequest,
    ) -> ServiceResult<Vec<SubscriberRow>> {
        let rows = sqlx::query_as::<_, SubscriberRow>(
            r#"
            SELECT MAX(id) AS id, user_id
            FROM subscriptions
            WHERE deleted_at IS NULL
              AND (cardinality($1::TEXT[]) = 0 OR channel = ANY($1))
            GROUP BY user_id
            HAVING ($2::BIGINT IS NULL OR MAX(id) < $2)
            ORDER BY MAX(id) DESC
            LIMIT $3
            "#,
        )
        .bind(channels)
        .bind(page.before_id)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_subscribers(&self, channels: &[String]) -> ServiceResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT user_id)
            FROM subscriptions
            WHERE deleted_at IS NULL
              AND (cardinality($1::TEXT[]) = 0 OR channel = ANY($1))
            "#,
        )
        .bind(channels)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// Wraps a `sqlx` transaction; sqlx rolls back on drop.
pub struct PgSubscriptionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SubscriptionTx for PgSubscriptionTx {
    async fn insert_missing(
        &mut self,
        user_id: &str,
        channels: &[String],
    ) -> ServiceResult<Vec<String>> {
        let inserted: Vec<String> = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions (user_id, channel)
            SELECT $1, requested.channel
            FROM UNNEST($2::TEXT[]) AS requested(channel)
            ON CONFLICT (user_id, channel) WHERE deleted_at IS NULL DO NOTHING
            RETURNING channel
            "#,
        )
        .bind(user_id)
        .bind(channels)
        .fetch_all(&mut *self.tx)
        .await?;

        debug!(user_id, requested = channels.len(), inserted = inserted.len(), "staged memberships");
        Ok(inserted)
    }

    async fn soft_delete(
        &mut self,
        user_id: &str,
        channels: &[String],
    ) -> ServiceResult<Vec<String>> {
        let mut removed: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE subscriptions
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND channel = ANY($2) AND deleted_at IS NULL
            RETURNING channel
            "#,
        )
        .bind(user_id)
        .bind(channels)
        .fetch_all(&mut *self.tx)
        .await?;

        // rows written before the unique index existed may repeat a channel
        removed.sort();
        removed.dedup();

        debug!(user_id, requested = channels.len(), removed = removed.len(), "staged removals");
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> ServiceResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ServiceResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
