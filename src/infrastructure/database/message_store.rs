//! System Message Store
//!
//! PostgreSQL persistence for server-generated messages. The insert is keyed
//! by `source_event_id` (unique), so a redelivered event finds the message
//! already present and neither a second row nor a second `MessageSent`
//! outbox row is written.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::unit_of_work::PgUnitOfWork;
use crate::application::outbox::CommitInterceptor;
use crate::domain::{Message, SystemMessageRepository};
use crate::shared::error::AppError;

/// PostgreSQL system message store.
#[derive(Clone)]
pub struct PgSystemMessageStore {
    uow: PgUnitOfWork,
}

impl PgSystemMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            uow: PgUnitOfWork::new(pool),
        }
    }
}

#[async_trait]
impl SystemMessageRepository for PgSystemMessageStore {
    #[instrument(skip_all, fields(message_id = message.id, source_event_id = ?message.source_event_id))]
    async fn save_system_message(&self, message: &mut Message) -> Result<bool, AppError> {
        let mut tx = CommitInterceptor::new(self.uow.begin().await?);

        let inserted = sqlx::query(
            r#"
            INSERT INTO messages (id, channel_id, author_id, content, message_type,
                                  source_event_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_event_id) DO NOTHING
            "#,
        )
        .bind(message.id)
        .bind(message.channel_id)
        .bind(message.author_id)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(message.source_event_id)
        .bind(message.created_at)
        .execute(&mut **tx.unit_of_work().as_mut())
        .await?
        .rows_affected();

        if inserted == 0 {
            debug!("System message already exists for source event");
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit(&mut [message]).await?;
        Ok(true)
    }
}
