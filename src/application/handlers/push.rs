//! Push Notification Handler
//!
//! Turns chat events into per-user push envelopes and hands them to the
//! real-time transport through the [`PushNotifier`] port.
//!
//! A failed delivery is transient: the whole event is retried on the next
//! poll and recipients that were already reached receive the envelope again.
//! Clients deduplicate on `event_id`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::outbox::{HandlerError, NotificationHandler};
use crate::domain::events::{
    CallStarted, DomainEvent, FileShared, FriendRequestAccepted, FriendRequestSent, MessageSent,
    PresenceChanged,
};

/// Push kinds understood by clients.
pub mod kind {
    pub const FRIEND_REQUEST: &str = "FRIEND_REQUEST";
    pub const FRIEND_REQUEST_ACCEPTED: &str = "FRIEND_REQUEST_ACCEPTED";
    pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
    pub const PRESENCE_UPDATE: &str = "PRESENCE_UPDATE";
    pub const CALL_INCOMING: &str = "CALL_INCOMING";
    pub const FILE_SHARED: &str = "FILE_SHARED";
}

/// One envelope addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    pub recipient_id: i64,
    pub kind: &'static str,
    /// Source event, for client-side deduplication
    pub event_id: Uuid,
    pub data: serde_json::Value,
}

/// Real-time push transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn push(&self, notification: PushNotification) -> Result<(), PushError>;
}

/// Transport failure.
#[derive(Debug, thiserror::Error)]
#[error("push delivery failed: {0}")]
pub struct PushError(pub String);

impl From<redis::RedisError> for PushError {
    fn from(e: redis::RedisError) -> Self {
        Self(e.to_string())
    }
}

impl From<serde_json::Error> for PushError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

/// Fans chat events out to the affected users.
pub struct PushNotificationHandler {
    notifier: Arc<dyn PushNotifier>,
}

impl PushNotificationHandler {
    pub fn new(notifier: Arc<dyn PushNotifier>) -> Self {
        Self { notifier }
    }

    async fn deliver(
        &self,
        event: &dyn DomainEvent,
        kind: &'static str,
        recipients: impl IntoIterator<Item = i64>,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let data = event
            .to_payload()
            .map_err(|e| HandlerError::Permanent(format!("cannot encode push data: {e}")))?;
        let event_id = event.metadata().event_id;

        for recipient_id in recipients {
            if cancel.is_cancelled() {
                return Err(HandlerError::Transient("shutdown requested".into()));
            }

            self.notifier
                .push(PushNotification {
                    recipient_id,
                    kind,
                    event_id,
                    data: data.clone(),
                })
                .await
                .map_err(|e| HandlerError::Transient(e.to_string()))?;
            debug!(recipient_id, kind, "Push delivered");
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler<FriendRequestSent> for PushNotificationHandler {
    fn name(&self) -> &'static str {
        "push"
    }

    #[instrument(skip_all, fields(friendship_id = event.friendship_id))]
    async fn handle(&self, event: &FriendRequestSent, cancel: &CancellationToken) -> Result<(), HandlerError> {
        self.deliver(event, kind::FRIEND_REQUEST, [event.addressee_id], cancel).await
    }
}

#[async_trait]
impl NotificationHandler<FriendRequestAccepted> for PushNotificationHandler {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn handle(&self, event: &FriendRequestAccepted, cancel: &CancellationToken) -> Result<(), HandlerError> {
        self.deliver(event, kind::FRIEND_REQUEST_ACCEPTED, [event.requester_id], cancel).await
    }
}

#[async_trait]
impl NotificationHandler<MessageSent> for PushNotificationHandler {
    fn name(&self) -> &'static str {
        "push"
    }

    #[instrument(skip_all, fields(message_id = event.message_id))]
    async fn handle(&self, event: &MessageSent, cancel: &CancellationToken) -> Result<(), HandlerError> {
        // Authors see their own messages through the write path; system
        // messages go to everyone involved.
        let recipients = event
            .recipient_ids
            .iter()
            .copied()
            .filter(|&id| event.system || id != event.author_id);
        self.deliver(event, kind::MESSAGE_CREATE, recipients, cancel).await
    }
}

#[async_trait]
impl NotificationHandler<PresenceChanged> for PushNotificationHandler {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn handle(&self, event: &PresenceChanged, cancel: &CancellationToken) -> Result<(), HandlerError> {
        self.deliver(event, kind::PRESENCE_UPDATE, event.watcher_ids.iter().copied(), cancel)
            .await
    }
}

#[async_trait]
impl NotificationHandler<CallStarted> for PushNotificationHandler {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn handle(&self, event: &CallStarted, cancel: &CancellationToken) -> Result<(), HandlerError> {
        self.deliver(event, kind::CALL_INCOMING, [event.callee_id], cancel).await
    }
}

#[async_trait]
impl NotificationHandler<FileShared> for PushNotificationHandler {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn handle(&self, event: &FileShared, cancel: &CancellationToken) -> Result<(), HandlerError> {
        let recipients = event
            .recipient_ids
            .iter()
            .copied()
            .filter(|&id| id != event.uploader_id);
        self.deliver(event, kind::FILE_SHARED, recipients, cancel).await
    }
}
