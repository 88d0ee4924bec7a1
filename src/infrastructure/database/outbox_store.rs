//! Outbox Store Implementation
//!
//! PostgreSQL implementation of the consumer side of the outbox. The
//! pending-row query is served by `idx_outbox_messages_pending`, a partial
//! index over `occurred_at` for rows that are neither processed nor failed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{OutboxMessage, OutboxStats, OutboxStore, RowOutcome, RowUpdate};
use crate::shared::error::AppError;

/// PostgreSQL outbox store.
#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for outbox queries.
#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    event_type: String,
    event_payload: serde_json::Value,
    occurred_at: DateTime<Utc>,
    event_id: Uuid,
    version: i32,
    entity_id: Option<i64>,
    triggered_by: Option<i64>,
    processed_at: Option<DateTime<Utc>>,
    retry_count: i32,
    error: Option<String>,
    failed_at: Option<DateTime<Utc>>,
}

impl OutboxRow {
    fn into_message(self) -> OutboxMessage {
        OutboxMessage {
            id: self.id,
            event_type: self.event_type,
            event_payload: self.event_payload,
            occurred_at: self.occurred_at,
            event_id: self.event_id,
            version: self.version,
            entity_id: self.entity_id,
            triggered_by: self.triggered_by,
            processed_at: self.processed_at,
            retry_count: self.retry_count,
            error: self.error,
            failed_at: self.failed_at,
        }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    #[instrument(skip(self))]
    async fn fetch_pending(
        &self,
        batch_size: usize,
        max_retry_count: i32,
    ) -> Result<Vec<OutboxMessage>, AppError> {
        let limit = i64::try_from(batch_size).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, event_type, event_payload, occurred_at, event_id, version,
                   entity_id, triggered_by, processed_at, retry_count, error, failed_at
            FROM outbox_messages
            WHERE processed_at IS NULL
              AND failed_at IS NULL
              AND retry_count < $1
            ORDER BY occurred_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(max_retry_count)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OutboxRow::into_message).collect())
    }

    #[instrument(skip_all, fields(updates = updates.len()))]
    async fn apply_updates(&self, updates: &[RowUpdate]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for update in updates {
            let result = match &update.outcome {
                RowOutcome::Processed { at } => {
                    sqlx::query("UPDATE outbox_messages SET processed_at = $2 WHERE id = $1")
                        .bind(update.id)
                        .bind(at)
                        .execute(&mut *tx)
                        .await?
                }
                RowOutcome::Retry { retry_count, error } => {
                    sqlx::query("UPDATE outbox_messages SET retry_count = $2, error = $3 WHERE id = $1")
                        .bind(update.id)
                        .bind(retry_count)
                        .bind(error)
                        .execute(&mut *tx)
                        .await?
                }
                RowOutcome::Failed {
                    retry_count,
                    error,
                    at,
                } => {
                    sqlx::query(
                        "UPDATE outbox_messages SET retry_count = $2, error = $3, failed_at = $4 WHERE id = $1",
                    )
                    .bind(update.id)
                    .bind(retry_count)
                    .bind(error)
                    .bind(at)
                    .execute(&mut *tx)
                    .await?
                }
            };

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the whole batch
                return Err(AppError::NotFound(format!("outbox message {}", update.id)));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> Result<OutboxStats, AppError> {
        let (pending, processed, failed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE processed_at IS NULL AND failed_at IS NULL),
                COUNT(*) FILTER (WHERE processed_at IS NOT NULL AND failed_at IS NULL),
                COUNT(*) FILTER (WHERE failed_at IS NOT NULL)
            FROM outbox_messages
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(OutboxStats {
            pending,
            processed,
            failed,
        })
    }
}
