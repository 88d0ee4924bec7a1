//! Commit Interceptor
//!
//! Wraps a [`UnitOfWork`] so that committing business rows and enqueuing the
//! events that describe them is a single atomic fact.
//!
//! On commit the interceptor:
//! 1. serializes the pending events of every touched aggregate, in the order
//!    the aggregates are given and then in append order;
//! 2. clears the harvested buffers;
//! 3. stages the resulting outbox rows into the same transaction;
//! 4. delegates to the underlying commit.
//!
//! If any event of the aggregates passed to `commit` fails to serialize, their
//! buffers are left untouched, nothing is staged and the transaction is rolled
//! back, so zero rows are written. Aggregates harvested earlier with
//! [`CommitInterceptor::harvest`] already had their buffers cleared; their
//! events are dropped along with the transaction.
//!
//! # Example
//! ```rust,ignore
//! let mut tx = CommitInterceptor::new(pg_uow.begin().await?);
//! let friendship = user.send_friend_request(id, addressee_id)?;
//! insert_friendship(tx.unit_of_work().as_mut(), &friendship).await?;
//! tx.commit(&mut [&mut user]).await?;
//! ```

use tracing::{debug, instrument, warn};

use crate::domain::{AggregateRoot, OutboxMessage, UnitOfWork};
use crate::shared::error::AppError;

/// Serialize every pending event of `aggregate` into `out` without touching
/// its buffer. Fails on the first event that cannot be serialized.
fn collect_messages(
    aggregate: &dyn AggregateRoot,
    out: &mut Vec<OutboxMessage>,
) -> Result<(), AppError> {
    for event in aggregate.pending_events() {
        out.push(OutboxMessage::from_event(event.as_ref())?);
    }
    Ok(())
}

/// A unit of work whose commit also enqueues domain events.
pub struct CommitInterceptor<U: UnitOfWork> {
    uow: U,
    harvested: Vec<OutboxMessage>,
}

impl<U: UnitOfWork> CommitInterceptor<U> {
    pub fn new(uow: U) -> Self {
        Self {
            uow,
            harvested: Vec::new(),
        }
    }

    /// Access the wrapped transaction for business writes.
    pub fn unit_of_work(&mut self) -> &mut U {
        &mut self.uow
    }

    /// Harvest one aggregate ahead of commit.
    ///
    /// Useful when an aggregate goes out of scope before the commit. The
    /// buffer is cleared here, so harvesting it again (or passing it to
    /// [`commit`](Self::commit)) does not enqueue its events twice.
    pub fn harvest(&mut self, aggregate: &mut dyn AggregateRoot) -> Result<usize, AppError> {
        let mut messages = Vec::new();
        collect_messages(&*aggregate, &mut messages)?;
        aggregate.clear_events();

        let count = messages.len();
        self.harvested.extend(messages);
        Ok(count)
    }

    /// Harvest `touched`, stage the outbox rows and commit.
    ///
    /// Returns the number of outbox rows written by this commit.
    #[instrument(skip_all, fields(aggregates = touched.len()))]
    pub async fn commit(mut self, touched: &mut [&mut dyn AggregateRoot]) -> Result<usize, AppError> {
        let mut fresh = Vec::new();
        for aggregate in touched.iter() {
            if let Err(e) = collect_messages(&**aggregate, &mut fresh) {
                warn!(error = %e, "Event harvest failed, abandoning unit of work");
                self.abandon().await;
                return Err(e);
            }
        }

        for aggregate in touched.iter_mut() {
            aggregate.clear_events();
        }

        self.harvested.extend(fresh);
        let messages = std::mem::take(&mut self.harvested);
        let count = messages.len();

        if !messages.is_empty() {
            if let Err(e) = self.uow.stage_outbox(messages).await {
                warn!(error = %e, "Failed to stage outbox rows, abandoning unit of work");
                self.abandon().await;
                return Err(e);
            }
        }

        self.uow.commit().await?;
        debug!(outbox_messages = count, "Unit of work committed");
        Ok(count)
    }

    /// Discard the transaction and anything harvested into it.
    pub async fn rollback(self) -> Result<(), AppError> {
        self.uow.rollback().await
    }

    async fn abandon(self) {
        if let Err(e) = self.uow.rollback().await {
            warn!(error = %e, "Rollback failed");
        }
    }
}
