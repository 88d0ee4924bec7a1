//! Producer side: business rows and outbox rows commit together.

use pretty_assertions::assert_eq;

use chat_outbox::application::outbox::CommitInterceptor;
use chat_outbox::domain::{AggregateRoot, OutboxStatus, PresenceStatus, User};
use chat_outbox::infrastructure::memory::MemoryDatabase;
use chat_outbox::shared::error::AppError;

#[tokio::test]
async fn test_commit_persists_business_and_outbox_rows_together() {
    let db = MemoryDatabase::new();
    let mut alice = User::new(1, "alice");
    let friendship = alice.send_friend_request(10, 2).unwrap();

    let mut tx = CommitInterceptor::new(db.begin());
    tx.unit_of_work().put_row("friendships", friendship.id, &friendship).unwrap();
    let written = tx.commit(&mut [&mut alice]).await.unwrap();

    assert_eq!(written, 1);
    assert!(db.row("friendships", 10).is_some());
    let outbox = db.outbox_messages();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].event_type, "friendship.request_sent.v1");
    assert_eq!(outbox[0].status(), OutboxStatus::Pending);
}

#[tokio::test]
async fn test_failed_commit_persists_neither() {
    let db = MemoryDatabase::new();
    db.set_fail_commits(true);
    let mut alice = User::new(1, "alice");
    let friendship = alice.send_friend_request(10, 2).unwrap();

    let mut tx = CommitInterceptor::new(db.begin());
    tx.unit_of_work().put_row("friendships", friendship.id, &friendship).unwrap();
    let result = tx.commit(&mut [&mut alice]).await;

    assert!(matches!(result, Err(AppError::CommitFailed(_))));
    assert_eq!(db.row_count("friendships"), 0);
    assert!(db.outbox_messages().is_empty());
}

#[tokio::test]
async fn test_harvesting_twice_enqueues_each_event_once() {
    let db = MemoryDatabase::new();
    let mut alice = User::new(1, "alice");
    alice.set_presence(PresenceStatus::Online, vec![2, 3]);
    alice.start_call(2, true);

    let mut tx = CommitInterceptor::new(db.begin());
    assert_eq!(tx.harvest(&mut alice).unwrap(), 2);
    assert_eq!(tx.harvest(&mut alice).unwrap(), 0);
    tx.commit(&mut [&mut alice]).await.unwrap();

    let types: Vec<_> = db.outbox_messages().into_iter().map(|m| m.event_type).collect();
    assert_eq!(types, vec!["presence.changed.v1", "call.started.v1"]);
    assert!(alice.pending_events().is_empty());
}

#[tokio::test]
async fn test_rollback_discards_staged_work() {
    let db = MemoryDatabase::new();
    let mut alice = User::new(1, "alice");
    alice.set_presence(PresenceStatus::Online, vec![2]);

    let mut tx = CommitInterceptor::new(db.begin());
    tx.harvest(&mut alice).unwrap();
    tx.unit_of_work().put_row("users", 1, &alice).unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(db.row_count("users"), 0);
    assert!(db.outbox_messages().is_empty());
}
