//! Outbox Processor
//!
//! Background loop that drains the outbox:
//!
//! ```text
//!   +------+   batch empty    +-------+
//!   | Poll | ---------------> | Sleep | ----+
//!   +------+                  +-------+     |
//!      ^  | batch non-empty       ^         |
//!      |  v                       |         |
//!      | Process one at a time -> Commit ---+
//!      |                                    |
//!      +------------------------------------+
//! ```
//!
//! Per message: resolve the type, decode the payload, publish to the
//! dispatcher and turn the result into a [`RowOutcome`]. All row-state
//! mutations of a batch are persisted in one commit after the last message.
//! A batch interrupted by shutdown persists nothing and is redone from
//! scratch on the next start.
//!
//! One processor instance is assumed. Two instances polling the same table
//! would dispatch the same rows twice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::registry::{DecodeError, EventTypeRegistry};
use crate::config::OutboxSettings;
use crate::domain::{OutboxMessage, OutboxStore, RowOutcome, RowUpdate};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Processor tuning, usually built from [`OutboxSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Delay between polls
    pub polling_interval: Duration,
    /// Maximum rows attempted per poll
    pub batch_size: usize,
    /// A row is failed once its retry count reaches this value
    pub max_retry_count: i32,
    /// Whether undecodable payloads consume retries instead of failing at once
    pub retry_malformed_payloads: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(5),
            batch_size: 50,
            max_retry_count: 3,
            retry_malformed_payloads: true,
        }
    }
}

impl From<&OutboxSettings> for ProcessorConfig {
    fn from(settings: &OutboxSettings) -> Self {
        Self {
            polling_interval: Duration::from_secs(settings.polling_interval_seconds),
            batch_size: settings.batch_size,
            max_retry_count: settings.max_retry_count,
            retry_malformed_payloads: settings.retry_malformed_payloads,
        }
    }
}

/// Counters for one poll cycle. Outcome counts cover persisted rows only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub attempted: usize,
    pub processed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Shutdown was requested mid-batch; nothing was persisted.
    pub interrupted: bool,
}

impl BatchReport {
    fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Processed { .. } => self.processed += 1,
            RowOutcome::Retry { .. } => self.retried += 1,
            RowOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Polls the outbox and dispatches pending messages.
pub struct OutboxProcessor {
    store: Arc<dyn OutboxStore>,
    registry: Arc<EventTypeRegistry>,
    dispatcher: Arc<Dispatcher>,
    config: ProcessorConfig,
}

impl OutboxProcessor {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        registry: Arc<EventTypeRegistry>,
        dispatcher: Arc<Dispatcher>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            registry,
            dispatcher,
            config,
        }
    }

    /// Spawn the loop on the runtime and return a handle to stop it.
    pub fn start(self) -> ProcessorHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));
        ProcessorHandle { token, task: Some(task) }
    }

    /// Run until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!(
            polling_interval_secs = self.config.polling_interval.as_secs(),
            batch_size = self.config.batch_size,
            max_retry_count = self.config.max_retry_count,
            "Outbox processor started"
        );

        loop {
            if token.is_cancelled() {
                break;
            }

            match self.run_cycle(&token).await {
                Ok(report) if report.fetched > 0 => info!(
                    attempted = report.attempted,
                    processed = report.processed,
                    retried = report.retried,
                    failed = report.failed,
                    interrupted = report.interrupted,
                    "Outbox batch finished"
                ),
                Ok(_) => debug!("Outbox empty"),
                Err(e) => error!(error = %e, "Outbox poll failed, retrying after interval"),
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.polling_interval) => {}
            }
        }

        info!("Outbox processor stopped");
    }

    /// Poll once, process the batch and persist the outcomes.
    #[instrument(skip_all)]
    pub async fn run_cycle(&self, token: &CancellationToken) -> Result<BatchReport, AppError> {
        let started = Instant::now();
        let batch = self
            .store
            .fetch_pending(self.config.batch_size, self.config.max_retry_count)
            .await?;

        let mut report = BatchReport {
            fetched: batch.len(),
            ..BatchReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let mut updates = Vec::with_capacity(batch.len());
        for message in &batch {
            if token.is_cancelled() {
                warn!(
                    remaining = batch.len() - report.attempted,
                    "Shutdown requested, abandoning batch"
                );
                report.interrupted = true;
                return Ok(report);
            }

            report.attempted += 1;
            let outcome = self.process_message(message, token).await;
            updates.push(RowUpdate {
                id: message.id,
                outcome,
            });
        }

        // Handlers stop early on shutdown; their outcomes say nothing about the row
        if token.is_cancelled() {
            warn!("Shutdown requested during the last item, abandoning batch");
            report.interrupted = true;
            return Ok(report);
        }

        self.store.apply_updates(&updates).await?;

        for update in &updates {
            report.record(&update.outcome);
            metrics::record_outbox_outcome(update.outcome.label());
        }
        metrics::record_outbox_batch(started.elapsed().as_secs_f64());

        Ok(report)
    }

    #[instrument(
        skip_all,
        fields(
            message_id = %message.id,
            event_type = %message.event_type,
            event_id = %message.event_id,
            retry_count = message.retry_count
        )
    )]
    async fn process_message(&self, message: &OutboxMessage, token: &CancellationToken) -> RowOutcome {
        let event = match self.registry.decode(&message.event_type, &message.event_payload) {
            Ok(event) => event,
            Err(e @ DecodeError::UnknownEventType(_)) => {
                error!(error = %e, "Unresolvable event type, failing message");
                return self.fail(message.retry_count, e.to_string());
            }
            Err(e @ DecodeError::MalformedPayload { .. }) => {
                if self.config.retry_malformed_payloads {
                    warn!(error = %e, "Undecodable payload");
                    return self.retry_or_fail(message, e.to_string());
                }
                error!(error = %e, "Undecodable payload, failing message");
                return self.fail(message.retry_count + 1, e.to_string());
            }
        };

        match self.dispatcher.publish(event.as_ref(), token).await {
            DispatchOutcome::Delivered => RowOutcome::Processed { at: Utc::now() },
            DispatchOutcome::Transient { handler, reason } => {
                self.retry_or_fail(message, format!("{handler}: {reason}"))
            }
            DispatchOutcome::Terminal { handler, reason } => {
                self.fail(message.retry_count + 1, format!("{handler}: {reason}"))
            }
        }
    }

    fn retry_or_fail(&self, message: &OutboxMessage, error: String) -> RowOutcome {
        let retry_count = message.retry_count + 1;
        if retry_count >= self.config.max_retry_count {
            error!(retry_count, %error, "Retries exhausted, failing message");
            self.fail(retry_count, error)
        } else {
            RowOutcome::Retry { retry_count, error }
        }
    }

    fn fail(&self, retry_count: i32, error: String) -> RowOutcome {
        RowOutcome::Failed {
            retry_count,
            error,
            at: Utc::now(),
        }
    }
}

/// Handle to a running processor.
///
/// Dropping the handle requests shutdown.
pub struct ProcessorHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProcessorHandle {
    /// Request shutdown. The loop stops at its next cancellation point.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Token observed by the loop and passed to handlers.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the loop to exit.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Outbox processor task panicked");
            }
        }
    }
}

impl Drop for ProcessorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
