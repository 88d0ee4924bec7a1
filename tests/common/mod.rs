//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

use chat_outbox::application::handlers::{PushError, PushNotification, PushNotifier};
use chat_outbox::application::outbox::{
    Dispatcher, EventTypeRegistry, HandlerError, NotificationHandler, OutboxProcessor,
    ProcessorConfig,
};
use chat_outbox::config::{
    DatabaseSettings, OutboxSettings, RedisSettings, ServerSettings, Settings, SnowflakeSettings,
};
use chat_outbox::domain::events::{DomainEvent, Event, EventMetadata, FriendRequestSent};
use chat_outbox::domain::OutboxMessage;
use chat_outbox::infrastructure::memory::MemoryDatabase;
use chat_outbox::presentation::http::create_router;
use chat_outbox::startup::AppState;

mockall::mock! {
    pub Notifier {}

    #[async_trait]
    impl PushNotifier for Notifier {
        async fn push(&self, notification: PushNotification) -> Result<(), PushError>;
    }
}

/// Settings for an in-memory deployment.
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: None,
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 1,
        },
        redis: RedisSettings::default(),
        outbox: OutboxSettings::default(),
        snowflake: SnowflakeSettings {
            machine_id: 1,
            node_id: 1,
        },
        log_format: "pretty".into(),
        environment: "test".into(),
    }
}

/// Processor tuning with a short interval.
pub fn config(batch_size: usize, max_retry_count: i32) -> ProcessorConfig {
    ProcessorConfig {
        polling_interval: Duration::from_secs(1),
        batch_size,
        max_retry_count,
        retry_malformed_payloads: true,
    }
}

pub fn processor(db: &MemoryDatabase, dispatcher: Dispatcher, config: ProcessorConfig) -> OutboxProcessor {
    OutboxProcessor::new(
        Arc::new(db.clone()),
        Arc::new(EventTypeRegistry::with_chat_events()),
        Arc::new(dispatcher),
        config,
    )
}

pub fn friend_request(friendship_id: i64) -> FriendRequestSent {
    FriendRequestSent {
        meta: EventMetadata::for_entity(1).triggered_by(1),
        friendship_id,
        requester_id: 1,
        addressee_id: 2,
    }
}

/// Store `event` as a pending outbox row and return the row.
pub fn seed(db: &MemoryDatabase, event: &dyn DomainEvent) -> OutboxMessage {
    let message = OutboxMessage::from_event(event).expect("event serializes");
    db.seed_outbox(message.clone());
    message
}

/// Handler that fails transiently a fixed number of times, then succeeds.
/// Records the event id of every invocation.
#[derive(Default)]
pub struct FlakyHandler {
    failures_left: Mutex<usize>,
    permanent: bool,
    calls: Mutex<Vec<Uuid>>,
    /// Cancelled after the first invocation when set
    cancel_after_first: Option<CancellationToken>,
}

impl FlakyHandler {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_times(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_left: Mutex::new(failures),
            ..Self::default()
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_times(usize::MAX)
    }

    pub fn permanently_failing() -> Arc<Self> {
        Arc::new(Self {
            failures_left: Mutex::new(usize::MAX),
            permanent: true,
            ..Self::default()
        })
    }

    pub fn cancelling(token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            cancel_after_first: Some(token),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<Uuid> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl<E: Event> NotificationHandler<E> for FlakyHandler {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn handle(&self, event: &E, _cancel: &CancellationToken) -> Result<(), HandlerError> {
        self.calls.lock().push(event.metadata().event_id);
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }

        let mut failures_left = self.failures_left.lock();
        if *failures_left == 0 {
            return Ok(());
        }
        *failures_left = failures_left.saturating_sub(1);

        if self.permanent {
            Err(HandlerError::Permanent("recipient no longer exists".into()))
        } else {
            Err(HandlerError::Transient("push gateway timeout".into()))
        }
    }
}

/// Admin router over an in-memory backend.
pub struct TestApp {
    pub router: Router,
    pub db: MemoryDatabase,
}

impl TestApp {
    pub fn new() -> Self {
        let db = MemoryDatabase::new();
        let state = AppState {
            store: Arc::new(db.clone()),
            redis: None,
            settings: Arc::new(test_settings()),
        };

        Self {
            router: create_router(state),
            db,
        }
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// GET and parse the body as JSON
    pub async fn get_json(&self, uri: &str) -> (axum::http::StatusCode, serde_json::Value) {
        let response = self.get(uri).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }
}
