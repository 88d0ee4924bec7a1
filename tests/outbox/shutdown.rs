//! Cooperative shutdown of the processor.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use std::sync::Arc;

use chat_outbox::application::handlers::PushNotificationHandler;
use chat_outbox::application::outbox::Dispatcher;
use chat_outbox::domain::events::{EventMetadata, FriendRequestSent, MessageSent};
use chat_outbox::domain::OutboxStore;
use chat_outbox::infrastructure::memory::MemoryDatabase;

use crate::common::{config, friend_request, processor, seed, FlakyHandler, MockNotifier};

#[tokio::test]
async fn test_interrupted_batch_persists_nothing() {
    let db = MemoryDatabase::new();
    let rows: Vec<_> = (0..3).map(|id| seed(&db, &friend_request(id))).collect();
    let token = CancellationToken::new();
    let handler = FlakyHandler::cancelling(token.clone());

    let mut dispatcher = Dispatcher::new();
    dispatcher.register::<FriendRequestSent, _>(handler.clone());

    let report = processor(&db, dispatcher, config(10, 3))
        .run_cycle(&token)
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.attempted, 1);
    assert_eq!(handler.call_count(), 1);
    // The first message was dispatched, but its outcome was not recorded
    for row in rows {
        assert_eq!(db.outbox_message(row.id).unwrap(), row);
    }
    assert_eq!(db.stats().await.unwrap().pending, 3);
}

#[tokio::test]
async fn test_shutdown_during_last_item_does_not_consume_a_retry() {
    let db = MemoryDatabase::new();
    let row = seed(
        &db,
        &MessageSent {
            meta: EventMetadata::for_entity(10).triggered_by(1),
            message_id: 10,
            channel_id: 5,
            author_id: 1,
            recipient_ids: vec![2, 3],
            content_preview: "hello".into(),
            system: false,
        },
    );
    let token = CancellationToken::new();

    // Shutdown lands after the first recipient, so the handler bails out
    let mut notifier = MockNotifier::new();
    let cancel = token.clone();
    notifier.expect_push().times(1).returning(move |_| {
        cancel.cancel();
        Ok(())
    });
    let mut dispatcher = Dispatcher::new();
    dispatcher.register::<MessageSent, _>(Arc::new(PushNotificationHandler::new(Arc::new(notifier))));

    let report = processor(&db, dispatcher, config(10, 1))
        .run_cycle(&token)
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.attempted, 1);
    assert_eq!(report.retried + report.failed, 0);
    assert_eq!(db.outbox_message(row.id).unwrap(), row);
    assert_eq!(db.stats().await.unwrap().pending, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_the_sleep() {
    let db = MemoryDatabase::new();
    let handler = FlakyHandler::succeeding();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register::<FriendRequestSent, _>(handler.clone());

    let mut settings = config(10, 3);
    settings.polling_interval = Duration::from_secs(3600);
    let handle = processor(&db, dispatcher, settings).start();

    // Let the first (empty) poll run, then stop while sleeping
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("loop exits without waiting for the poll interval");

    seed(&db, &friend_request(1));
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(handler.call_count(), 0);
}
