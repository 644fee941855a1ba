use async_trait::async_trait;
use cursor_codec::PageRequest;
use error_types::ServiceResult;
use sqlx::PgPool;
use tracing::debug;

use super::ChannelRepository;
use crate::models::{ChannelChanges, ChannelFilter, ChannelKey, ChannelRecord, NewChannel};

const CHANNEL_COLUMNS: &str =
    "id, title, label, description, owner_id, subscribers, created_at, deleted_at";

/// PostgreSQL repository for channels (source of truth for subscriber counts)
#[derive(Clone)]
pub struct PgChannelRepository {
    pool: PgPool,
}

impl PgChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for PgChannelRepository {
    async fn create(&self, channel: &NewChannel) -> ServiceResult<ChannelRecord> {
        let record = sqlx::query_as::<_, ChannelRecord>(&format!(
            r#"
            INSERT INTO channels (title, label, description, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {CHANNEL_COLUMNS}
            "#
        ))
        .bind(&channel.title)
        .bind(&channel.label)
        .bind(&channel.description)
        .bind(&channel.owner_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(channel_id = record.id, title = %record.title, "inserted channel");
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        changes: &ChannelChanges,
    ) -> ServiceResult<Option<ChannelRecord>> {
        let record = sqlx::query_as::<_, ChannelRecord>(&format!(
            r#"
            UPDATE channels SET
                title = COALESCE($2, title),
                label = COALESCE($3, label),
                description = COALESCE($4, description),
                owner_id = COALESCE($5, owner_id)
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {CHANNEL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.label.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.owner_id.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        if record.is_some() {
            debug!(channel_id = id, "updated channel");
        }
        Ok(record)
    }

    async fn soft_delete(&self, id: i64) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE channels SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        debug!(channel_id = id, rows = result.rows_affected(), "soft deleted channel");
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, key: &ChannelKey) -> ServiceResult<Option<ChannelRecord>> {
        let record = match key {
            ChannelKey::Id(id) => {
                sqlx::query_as::<_, ChannelRecord>(&format!(
                    "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            ChannelKey::Title(title) => {
                sqlx::query_as::<_, ChannelRecord>(&format!(
                    "SELECT {CHANNEL_COLUMNS} FROM channels WHERE title = $1"
                ))
                .bind(title)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(record)
    }

    async fn find_live(&self, id: i64) -> ServiceResult<Option<ChannelRecord>> {
        let record = sqlx::query_as::<_, ChannelRecord>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_page(
        &self,
        filter: &ChannelFilter,
        page: &PageRequest,
    ) -> ServiceResult<Vec<ChannelRecord>> {
        let records = sqlx::query_as::<_, ChannelRecord>(&format!(
            r#"
            SELECT {CHANNEL_COLUMNS}
            FROM channels
            WHERE ($1::BIGINT IS NULL OR id < $1)
              AND ($2::TEXT IS NULL OR owner_id = $2)
            ORDER BY id DESC
            LIMIT $3
            "#
        ))
        .bind(page.before_id)
        .bind(filter.owner_id.as_deref())
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn count(&self, filter: &ChannelFilter) -> ServiceResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM channels WHERE ($1::TEXT IS NULL OR owner_id = $1)",
        )
        .bind(filter.owner_id.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn adjust_subscribers(
        &self,
        titles: &[String],
        delta: i32,
    ) -> ServiceResult<Vec<(String, i32)>> {
        // rows are locked in id order so overlapping multi-channel updates queue
        // behind each other instead of deadlocking
        let updated = sqlx::query_as::<_, (String, i32)>(
            r#"
            UPDATE channels
            SET subscribers = subscribers + $2
            WHERE id IN (
                SELECT id FROM channels
                WHERE title = ANY($1) AND deleted_at IS NULL
                ORDER BY id
                FOR UPDATE
            )
            RETURNING title, subscribers
            "#,
        )
        .bind(titles)
        .bind(delta)
        .fetch_all(&self.pool)
        .await?;

        debug!(channels = ?titles, delta, touched = updated.len(), "adjusted subscriber counters");
        Ok(updated)
    }
}
