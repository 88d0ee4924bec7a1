//! Outbox Monitoring Handlers
//!
//! `GET /outbox/stats` reports row counts per delivery state. A growing
//! `failed` count means notifications were dropped and needs an operator.

use axum::{extract::State, Json};
use tracing::warn;

use crate::domain::OutboxStats;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Current backlog. Also refreshes the `outbox_backlog` gauges.
pub async fn stats(State(state): State<AppState>) -> Result<Json<OutboxStats>, AppError> {
    let stats = state.store.stats().await?;
    metrics::update_outbox_backlog(&stats);

    if stats.failed > 0 {
        warn!(failed = stats.failed, "Outbox has terminally failed messages");
    }

    Ok(Json(stats))
}
