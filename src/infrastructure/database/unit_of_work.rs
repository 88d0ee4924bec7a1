//! Unit of Work Pattern Implementation
//!
//! A [`TransactionContext`] wraps one SQLx transaction. Repositories write
//! business rows through [`TransactionContext::as_mut`]; the commit
//! interceptor stages outbox rows through the [`UnitOfWork`] impl so both
//! land in the same commit.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use crate::domain::{OutboxMessage, UnitOfWork};
use crate::shared::error::AppError;

/// Postgres bind parameter limit is 65535; 12 columns per row.
const MAX_ROWS_PER_INSERT: usize = 5000;

/// Transaction context that wraps a SQLx transaction.
pub struct TransactionContext {
    tx: Transaction<'static, Postgres>,
}

impl TransactionContext {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    /// Get a reference to the underlying transaction for query execution.
    pub fn as_mut(&mut self) -> &mut Transaction<'static, Postgres> {
        &mut self.tx
    }
}

#[async_trait]
impl UnitOfWork for TransactionContext {
    async fn stage_outbox(&mut self, messages: Vec<OutboxMessage>) -> Result<(), AppError> {
        for chunk in messages.chunks(MAX_ROWS_PER_INSERT) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO outbox_messages (id, event_type, event_payload, occurred_at, \
                 event_id, version, entity_id, triggered_by, processed_at, retry_count, \
                 error, failed_at) ",
            );
            builder.push_values(chunk, |mut row, m| {
                row.push_bind(m.id)
                    .push_bind(&m.event_type)
                    .push_bind(&m.event_payload)
                    .push_bind(m.occurred_at)
                    .push_bind(m.event_id)
                    .push_bind(m.version)
                    .push_bind(m.entity_id)
                    .push_bind(m.triggered_by)
                    .push_bind(m.processed_at)
                    .push_bind(m.retry_count)
                    .push_bind(&m.error)
                    .push_bind(m.failed_at);
            });
            builder.build().execute(&mut *self.tx).await?;
        }

        debug!(count = messages.len(), "Staged outbox rows");
        Ok(())
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await.map_err(AppError::Database)
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await.map_err(AppError::Database)
    }
}

/// Opens transactions on the pool.
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a new transaction.
    pub async fn begin(&self) -> Result<TransactionContext, AppError> {
        let tx = self.pool.begin().await.map_err(AppError::Database)?;
        Ok(TransactionContext::new(tx))
    }
}
