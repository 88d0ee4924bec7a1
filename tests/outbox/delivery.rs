//! Consumer side: retry bookkeeping, ordering and batch bounds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use chat_outbox::application::handlers::SystemMessageHandler;
use chat_outbox::application::outbox::Dispatcher;
use chat_outbox::domain::events::{EventMetadata, FriendRequestAccepted, FriendRequestSent};
use chat_outbox::domain::{OutboxStatus, OutboxStore};
use chat_outbox::infrastructure::memory::{MemoryDatabase, MemorySystemMessageStore};
use chat_outbox::shared::snowflake::SnowflakeGenerator;

use crate::common::{config, friend_request, processor, seed, FlakyHandler};

fn dispatcher_with(handler: &Arc<FlakyHandler>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register::<FriendRequestSent, _>(handler.clone());
    dispatcher
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_delivered() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::failing_times(2);
    let row = seed(&db, &friend_request(10));
    let processor = processor(&db, dispatcher_with(&handler), config(10, 3));
    let token = CancellationToken::new();

    for expected_retries in [1, 2] {
        let report = processor.run_cycle(&token).await.unwrap();
        assert_eq!(report.retried, 1);
        let stored = db.outbox_message(row.id).unwrap();
        assert_eq!(stored.retry_count, expected_retries);
        assert_eq!(stored.status(), OutboxStatus::Pending);
        assert_eq!(stored.error.as_deref(), Some("flaky: push gateway timeout"));
    }

    let report = processor.run_cycle(&token).await.unwrap();
    assert_eq!(report.processed, 1);

    let stored = db.outbox_message(row.id).unwrap();
    assert!(stored.processed_at.is_some());
    assert_eq!(handler.call_count(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_message_for_good() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::always_failing();
    let row = seed(&db, &friend_request(10));
    let processor = processor(&db, dispatcher_with(&handler), config(10, 3));
    let token = CancellationToken::new();

    for _ in 0..3 {
        processor.run_cycle(&token).await.unwrap();
    }

    let stored = db.outbox_message(row.id).unwrap();
    assert_eq!(stored.status(), OutboxStatus::Failed);
    assert_eq!(stored.retry_count, 3);
    assert!(stored.failed_at.is_some());

    // Excluded from later polls
    let report = processor.run_cycle(&token).await.unwrap();
    assert_eq!(report.fetched, 0);
    assert!(db.fetch_pending(10, 3).await.unwrap().is_empty());
    assert_eq!(handler.call_count(), 3);
}

#[tokio::test]
async fn test_permanent_handler_error_fails_immediately() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::permanently_failing();
    let row = seed(&db, &friend_request(10));

    processor(&db, dispatcher_with(&handler), config(10, 3))
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let stored = db.outbox_message(row.id).unwrap();
    assert_eq!(stored.status(), OutboxStatus::Failed);
    assert_eq!(stored.retry_count, 1);
    assert_eq!(handler.call_count(), 1);
}

#[tokio::test]
async fn test_unresolvable_type_fails_without_consuming_retries() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::succeeding();
    let mut row = seed(&db, &friend_request(10));
    row.id = uuid::Uuid::now_v7();
    row.event_type = "friendship.renamed.v9".into();
    db.seed_outbox(row.clone());

    let report = processor(&db, dispatcher_with(&handler), config(10, 3))
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    let stored = db.outbox_message(row.id).unwrap();
    assert_eq!(stored.status(), OutboxStatus::Failed);
    assert_eq!(stored.retry_count, 0);
    assert!(stored.error.unwrap().contains("friendship.renamed.v9"));
}

#[tokio::test]
async fn test_malformed_payload_is_retried() {
    let db = MemoryDatabase::new();
    let mut row = seed(&db, &friend_request(10));
    row.id = uuid::Uuid::now_v7();
    row.event_payload = serde_json::json!({ "friendship_id": "ten" });
    db.seed_outbox(row.clone());

    processor(&db, Dispatcher::new(), config(10, 3))
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    let stored = db.outbox_message(row.id).unwrap();
    assert_eq!(stored.status(), OutboxStatus::Pending);
    assert_eq!(stored.retry_count, 1);
}

#[tokio::test]
async fn test_rows_are_attempted_oldest_first() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::succeeding();
    let now = Utc::now();

    let mut events = Vec::new();
    for offset in [30, -30, 0] {
        let mut event = friend_request(10 + offset);
        event.meta = EventMetadata::for_entity(1).occurred_at(now + chrono::Duration::seconds(offset));
        seed(&db, &event);
        events.push((offset, event.meta.event_id));
    }
    events.sort_by_key(|(offset, _)| *offset);
    let expected: Vec<_> = events.into_iter().map(|(_, id)| id).collect();

    processor(&db, dispatcher_with(&handler), config(10, 3))
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handler.calls(), expected);
}

#[tokio::test]
async fn test_batch_size_bounds_each_cycle() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::succeeding();
    for id in 0..5 {
        seed(&db, &friend_request(id));
    }
    let processor = processor(&db, dispatcher_with(&handler), config(2, 3));
    let token = CancellationToken::new();

    let first = processor.run_cycle(&token).await.unwrap();
    assert_eq!(first.attempted, 2);
    assert_eq!(handler.call_count(), 2);
    assert_eq!(db.stats().await.unwrap().pending, 3);

    processor.run_cycle(&token).await.unwrap();
    let last = processor.run_cycle(&token).await.unwrap();
    assert_eq!(last.attempted, 1);
    assert_eq!(db.stats().await.unwrap().processed, 5);
}

#[tokio::test]
async fn test_redelivered_event_does_not_duplicate_state() {
    let db = MemoryDatabase::new();
    let event = FriendRequestAccepted {
        meta: EventMetadata::for_entity(7).triggered_by(2),
        friendship_id: 7,
        requester_id: 1,
        addressee_id: 2,
    };
    // Same event enqueued twice, as after a crash between dispatch and bookkeeping
    seed(&db, &event);
    seed(&db, &event);

    let mut dispatcher = Dispatcher::new();
    dispatcher.register::<FriendRequestAccepted, _>(Arc::new(SystemMessageHandler::new(
        Arc::new(MemorySystemMessageStore::new(db.clone())),
        Arc::new(SnowflakeGenerator::new(1, 1)),
    )));

    let report = processor(&db, dispatcher, config(10, 3))
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(db.row_count("messages"), 1);
    let chained = db
        .outbox_messages()
        .into_iter()
        .filter(|m| m.event_type == "message.sent.v1")
        .count();
    assert_eq!(chained, 1);
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_store_outage() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::succeeding();
    let row = seed(&db, &friend_request(10));
    db.set_unavailable(true);

    let handle = processor(&db, dispatcher_with(&handler), config(10, 3)).start();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(handler.call_count(), 0);

    db.set_unavailable(false);
    tokio::time::sleep(Duration::from_secs(3)).await;

    handle.shutdown();
    handle.join().await;
    assert!(db.outbox_message(row.id).unwrap().processed_at.is_some());
    assert_eq!(handler.call_count(), 1);
}
