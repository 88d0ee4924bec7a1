//! In-Memory Backend
//!
//! Transactional stand-in for PostgreSQL, used when no database URL is
//! configured and by the test suite.
//!
//! Business rows are JSON documents keyed by `(table, key)`. A
//! [`MemoryTransaction`] buffers row writes and outbox rows and applies them
//! under one lock on commit, so a commit is all-or-nothing. Failures can be
//! injected at commit time and on the consumer side of the outbox.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::application::outbox::CommitInterceptor;
use crate::domain::{
    Message, OutboxMessage, OutboxStats, OutboxStatus, OutboxStore, RowUpdate,
    SystemMessageRepository, UnitOfWork,
};
use crate::shared::error::AppError;

type RowKey = (String, String);

#[derive(Default)]
struct State {
    rows: BTreeMap<RowKey, serde_json::Value>,
    outbox: Vec<OutboxMessage>,
    fail_commits: bool,
    unavailable: bool,
}

/// Shared handle to the in-memory database. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction.
    pub fn begin(&self) -> MemoryTransaction {
        MemoryTransaction {
            db: self.clone(),
            rows: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Committed business row.
    pub fn row(&self, table: &str, key: impl ToString) -> Option<serde_json::Value> {
        self.state
            .lock()
            .rows
            .get(&(table.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of committed rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().rows.keys().filter(|(t, _)| t == table).count()
    }

    /// Every committed outbox row, in insertion order.
    pub fn outbox_messages(&self) -> Vec<OutboxMessage> {
        self.state.lock().outbox.clone()
    }

    pub fn outbox_message(&self, id: Uuid) -> Option<OutboxMessage> {
        self.state.lock().outbox.iter().find(|m| m.id == id).cloned()
    }

    /// Insert an outbox row outside any transaction.
    pub fn seed_outbox(&self, message: OutboxMessage) {
        self.state.lock().outbox.push(message);
    }

    /// Make every subsequent commit fail after staging.
    pub fn set_fail_commits(&self, fail: bool) {
        self.state.lock().fail_commits = fail;
    }

    /// Make outbox polling and row updates fail, as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    fn ensure_available(state: &State) -> Result<(), AppError> {
        if state.unavailable {
            return Err(AppError::Internal("database unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for MemoryDatabase {
    async fn fetch_pending(
        &self,
        batch_size: usize,
        max_retry_count: i32,
    ) -> Result<Vec<OutboxMessage>, AppError> {
        let state = self.state.lock();
        Self::ensure_available(&state)?;

        let mut pending: Vec<_> = state
            .outbox
            .iter()
            .filter(|m| m.is_deliverable(max_retry_count))
            .cloned()
            .collect();
        pending.sort_by(|a, b| (a.occurred_at, a.id).cmp(&(b.occurred_at, b.id)));
        pending.truncate(batch_size);
        Ok(pending)
    }

    async fn apply_updates(&self, updates: &[RowUpdate]) -> Result<(), AppError> {
        let mut state = self.state.lock();
        Self::ensure_available(&state)?;

        let mut positions = Vec::with_capacity(updates.len());
        for update in updates {
            let position = state
                .outbox
                .iter()
                .position(|m| m.id == update.id)
                .ok_or_else(|| AppError::NotFound(format!("outbox message {}", update.id)))?;
            positions.push(position);
        }

        for (position, update) in positions.into_iter().zip(updates) {
            state.outbox[position].apply(&update.outcome);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<OutboxStats, AppError> {
        let state = self.state.lock();
        Self::ensure_available(&state)?;

        let mut stats = OutboxStats::default();
        for message in &state.outbox {
            match message.status() {
                OutboxStatus::Pending => stats.pending += 1,
                OutboxStatus::Processed => stats.processed += 1,
                OutboxStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

/// Buffered writes applied atomically on commit.
pub struct MemoryTransaction {
    db: MemoryDatabase,
    rows: Vec<(RowKey, serde_json::Value)>,
    outbox: Vec<OutboxMessage>,
}

impl MemoryTransaction {
    /// Upsert a business row.
    pub fn put_row<T: Serialize>(&mut self, table: &str, key: impl ToString, value: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)?;
        self.rows.push(((table.to_string(), key.to_string()), value));
        Ok(())
    }

    /// Insert a business row unless the key already exists, committed or
    /// staged. Returns whether the row was staged.
    pub fn insert_row_if_absent<T: Serialize>(
        &mut self,
        table: &str,
        key: impl ToString,
        value: &T,
    ) -> Result<bool, AppError> {
        let key = (table.to_string(), key.to_string());
        let exists = self.rows.iter().any(|(k, _)| k == &key) || self.db.state.lock().rows.contains_key(&key);
        if exists {
            return Ok(false);
        }

        self.rows.push((key, serde_json::to_value(value)?));
        Ok(true)
    }
}

#[async_trait]
impl UnitOfWork for MemoryTransaction {
    async fn stage_outbox(&mut self, messages: Vec<OutboxMessage>) -> Result<(), AppError> {
        self.outbox.extend(messages);
        Ok(())
    }

    async fn commit(self) -> Result<(), AppError> {
        let mut state = self.db.state.lock();
        if state.fail_commits {
            return Err(AppError::CommitFailed("injected commit failure".into()));
        }

        for (key, value) in self.rows {
            state.rows.insert(key, value);
        }
        state.outbox.extend(self.outbox);
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }
}

/// System messages stored as `messages` rows keyed by their source event.
#[derive(Clone)]
pub struct MemorySystemMessageStore {
    db: MemoryDatabase,
}

impl MemorySystemMessageStore {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SystemMessageRepository for MemorySystemMessageStore {
    async fn save_system_message(&self, message: &mut Message) -> Result<bool, AppError> {
        let source = message
            .source_event_id
            .ok_or_else(|| AppError::Internal("system message without source event".into()))?;

        let mut tx = CommitInterceptor::new(self.db.begin());
        if !tx.unit_of_work().insert_row_if_absent("messages", source, &*message)? {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit(&mut [message]).await?;
        Ok(true)
    }
}
