//! Health Check Handlers
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the process running?)
//! - `GET /health/ready` - Readiness probe (are the outbox dependencies reachable?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::startup::AppState;

/// Process start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub outbox_store: ServiceHealth,
    pub push_transport: ServiceHealth,
}

/// Health of one dependency
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    fn from_latency(latency_ms: u64, degraded_after_ms: u64) -> Self {
        Self {
            status: if latency_ms < degraded_after_ms {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    fn unhealthy(message: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Returns 200 if the outbox store answers, 503 otherwise.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store_health = check_outbox_store(&state).await;
    let push_health = check_push_transport(&state).await;
    let overall_status = determine_overall_status(&store_health, &push_health);

    let response = DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks {
            outbox_store: store_health,
            push_transport: push_health,
        },
    };

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

async fn check_outbox_store(state: &AppState) -> ServiceHealth {
    let start = Instant::now();
    match state.store.stats().await {
        Ok(_) => ServiceHealth::from_latency(start.elapsed().as_millis() as u64, 100),
        Err(e) => ServiceHealth::unhealthy(format!("Outbox store unavailable: {}", e)),
    }
}

async fn check_push_transport(state: &AppState) -> ServiceHealth {
    let Some(redis) = &state.redis else {
        return ServiceHealth {
            status: HealthStatus::Degraded,
            latency_ms: None,
            message: Some("No push transport configured, pushes are logged only".into()),
        };
    };

    let start = Instant::now();
    match redis.ping().await {
        Ok(()) => ServiceHealth::from_latency(start.elapsed().as_millis() as u64, 50),
        Err(e) => ServiceHealth::unhealthy(format!("Redis connection failed: {}", e)),
    }
}

/// Outbox store down means nothing can be delivered; a push transport
/// problem only degrades delivery since failed pushes are retried.
fn determine_overall_status(store: &ServiceHealth, push: &ServiceHealth) -> HealthStatus {
    if store.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }
    if store.status == HealthStatus::Degraded || push.status != HealthStatus::Healthy {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}
