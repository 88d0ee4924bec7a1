//! A friend request whose push fails once, end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mockall::Sequence;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use chat_outbox::application::handlers::{PushError, PushNotificationHandler};
use chat_outbox::application::outbox::{CommitInterceptor, Dispatcher};
use chat_outbox::domain::events::FriendRequestSent;
use chat_outbox::domain::{OutboxStatus, User};
use chat_outbox::infrastructure::memory::MemoryDatabase;

use crate::common::{config, processor, MockNotifier};

#[tokio::test]
async fn test_friend_request_push_is_retried_once_then_delivered() {
    let db = MemoryDatabase::new();

    // Command side: the friendship row and the event commit together
    let mut alice = User::new(1, "alice");
    let friendship = alice.send_friend_request(10, 2).unwrap();
    let mut tx = CommitInterceptor::new(db.begin());
    tx.unit_of_work().put_row("friendships", friendship.id, &friendship).unwrap();
    tx.commit(&mut [&mut alice]).await.unwrap();

    let friendship_row = db.row("friendships", 10).unwrap();
    assert_eq!(friendship_row["status"], "pending");
    let outbox = db.outbox_messages();
    assert_eq!(outbox.len(), 1);
    let row = outbox[0].clone();

    // Push transport: times out once, then succeeds
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut notifier = MockNotifier::new();
    let mut seq = Sequence::new();
    let counter = attempts.clone();
    notifier
        .expect_push()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PushError("gateway timeout".into()))
        });
    let counter = attempts.clone();
    let event_id = row.event_id;
    notifier
        .expect_push()
        .withf(move |n| n.recipient_id == 2 && n.event_id == event_id)
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    let mut dispatcher = Dispatcher::new();
    dispatcher.register::<FriendRequestSent, _>(Arc::new(PushNotificationHandler::new(Arc::new(notifier))));
    let processor = processor(&db, dispatcher, config(10, 3));
    let token = CancellationToken::new();

    // Poll 1: transient failure
    processor.run_cycle(&token).await.unwrap();
    let stored = db.outbox_message(row.id).unwrap();
    assert_eq!(stored.retry_count, 1);
    assert_eq!(stored.status(), OutboxStatus::Pending);

    // Poll 2: delivered
    processor.run_cycle(&token).await.unwrap();
    let stored = db.outbox_message(row.id).unwrap();
    assert!(stored.processed_at.is_some());
    assert_eq!(stored.retry_count, 1);

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(db.row("friendships", 10).unwrap(), friendship_row);
}
