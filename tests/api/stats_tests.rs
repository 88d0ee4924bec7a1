//! Outbox Stats API Tests

use axum::http::StatusCode;
use chrono::Utc;
use pretty_assertions::assert_eq;

use chat_outbox::domain::RowOutcome;

use crate::common::{friend_request, seed, TestApp};

#[tokio::test]
async fn test_stats_on_empty_outbox() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/outbox/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "pending": 0, "processed": 0, "failed": 0 }));
}

#[tokio::test]
async fn test_stats_counts_each_state() {
    let app = TestApp::new();
    seed(&app.db, &friend_request(1));

    let mut processed = chat_outbox::domain::OutboxMessage::from_event(&friend_request(2)).unwrap();
    processed.apply(&RowOutcome::Processed { at: Utc::now() });
    app.db.seed_outbox(processed);

    let mut failed = chat_outbox::domain::OutboxMessage::from_event(&friend_request(3)).unwrap();
    failed.apply(&RowOutcome::Failed {
        retry_count: 3,
        error: "gateway timeout".into(),
        at: Utc::now(),
    });
    app.db.seed_outbox(failed);

    let (status, body) = app.get_json("/outbox/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "pending": 1, "processed": 1, "failed": 1 }));
}

#[tokio::test]
async fn test_stats_store_outage_is_internal_error() {
    let app = TestApp::new();
    app.db.set_unavailable(true);
    let (status, body) = app.get_json("/outbox/stats").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 10000);
}
