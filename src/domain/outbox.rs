//! Outbox message model and storage contracts.
//!
//! Maps to the `outbox_messages` table:
//! - id: UUID PRIMARY KEY
//! - event_type: TEXT NOT NULL (registry name, e.g. `message.sent.v1`)
//! - event_payload: JSONB NOT NULL (flat document of the full event)
//! - occurred_at: TIMESTAMPTZ NOT NULL (delivery order)
//! - event_id, version, entity_id, triggered_by: copied for correlation
//! - processed_at: TIMESTAMPTZ NULL (NULL = pending)
//! - retry_count: INT NOT NULL DEFAULT 0
//! - error: TEXT NULL (last failure reason)
//! - failed_at: TIMESTAMPTZ NULL (terminal failure)
//!
//! Rows carry no reference to the source aggregate beyond the copied
//! metadata.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::DomainEvent;
use crate::shared::error::AppError;

/// Delivery state derived from the nullable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Processed,
    Failed,
}

/// A durable record of one domain event awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub event_type: String,
    pub event_payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub event_id: Uuid,
    pub version: i32,
    pub entity_id: Option<i64>,
    pub triggered_by: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub error: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Build a pending row from an event.
    ///
    /// Serialization failure is reported as `AppError::Harvest` so the
    /// caller can abandon the whole unit of work.
    pub fn from_event(event: &dyn DomainEvent) -> Result<Self, AppError> {
        let event_type = event.event_type();
        let event_payload = event
            .to_payload()
            .map_err(|source| AppError::Harvest { event_type, source })?;
        let meta = event.metadata();

        Ok(Self {
            id: Uuid::now_v7(),
            event_type: event_type.to_string(),
            event_payload,
            occurred_at: meta.date_occurred,
            event_id: meta.event_id,
            version: meta.version,
            entity_id: meta.entity_id,
            triggered_by: meta.triggered_by,
            processed_at: None,
            retry_count: 0,
            error: None,
            failed_at: None,
        })
    }

    pub fn status(&self) -> OutboxStatus {
        if self.failed_at.is_some() {
            OutboxStatus::Failed
        } else if self.processed_at.is_some() {
            OutboxStatus::Processed
        } else {
            OutboxStatus::Pending
        }
    }

    /// Whether the processor may still pick this row up.
    pub fn is_deliverable(&self, max_retry_count: i32) -> bool {
        self.status() == OutboxStatus::Pending && self.retry_count < max_retry_count
    }

    /// Apply a processing outcome to this row.
    pub fn apply(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Processed { at } => {
                self.processed_at = Some(*at);
            }
            RowOutcome::Retry { retry_count, error } => {
                self.retry_count = *retry_count;
                self.error = Some(error.clone());
            }
            RowOutcome::Failed {
                retry_count,
                error,
                at,
            } => {
                self.retry_count = *retry_count;
                self.error = Some(error.clone());
                self.failed_at = Some(*at);
            }
        }
    }
}

/// Row-state mutation decided by the processor for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Dispatched; set `processed_at`.
    Processed { at: DateTime<Utc> },
    /// Transient failure; stays pending with a bumped retry count.
    Retry { retry_count: i32, error: String },
    /// Terminal failure; excluded from future polls.
    Failed {
        retry_count: i32,
        error: String,
        at: DateTime<Utc>,
    },
}

impl RowOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Processed { .. } => "processed",
            Self::Retry { .. } => "retried",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Outcome addressed to a specific row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub id: Uuid,
    pub outcome: RowOutcome,
}

/// Row counts per delivery state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutboxStats {
    pub pending: i64,
    pub processed: i64,
    pub failed: i64,
}

/// Queryable backlog of outbox rows.
///
/// Rows are only ever appended through a [`UnitOfWork`]; this trait covers
/// the consumer side.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Next `batch_size` pending rows with `retry_count < max_retry_count`,
    /// oldest `occurred_at` first.
    async fn fetch_pending(
        &self,
        batch_size: usize,
        max_retry_count: i32,
    ) -> Result<Vec<OutboxMessage>, AppError>;

    /// Persist every row-state mutation of a batch in a single commit.
    async fn apply_updates(&self, updates: &[RowUpdate]) -> Result<(), AppError>;

    /// Row counts per delivery state, for monitoring.
    async fn stats(&self) -> Result<OutboxStats, AppError>;
}

/// An open transaction that business writes and outbox rows share.
///
/// Business rows are written through the concrete type; the commit
/// interceptor only needs to stage outbox rows and finish the transaction.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Stage outbox rows so they commit together with the business rows.
    async fn stage_outbox(&mut self, messages: Vec<OutboxMessage>) -> Result<(), AppError>;

    /// Commit everything staged so far.
    async fn commit(self) -> Result<(), AppError>;

    /// Discard everything staged so far.
    async fn rollback(self) -> Result<(), AppError>;
}
