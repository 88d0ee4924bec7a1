//! Chat domain events raised by the aggregates in `domain::entities`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EventMetadata;
use crate::domain::entities::PresenceStatus;
use crate::domain_event;

/// A user asked another user to become friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequestSent {
    #[serde(flatten)]
    pub meta: EventMetadata,
    pub friendship_id: i64,
    pub requester_id: i64,
    pub addressee_id: i64,
}

domain_event!(FriendRequestSent, "friendship.request_sent.v1");

/// A pending friend request was accepted by its addressee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequestAccepted {
    #[serde(flatten)]
    pub meta: EventMetadata,
    pub friendship_id: i64,
    pub requester_id: i64,
    pub addressee_id: i64,
}

domain_event!(FriendRequestAccepted, "friendship.request_accepted.v1");

/// A message was posted to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSent {
    #[serde(flatten)]
    pub meta: EventMetadata,
    pub message_id: i64,
    pub channel_id: i64,
    pub author_id: i64,
    /// Users that should receive a push for this message
    #[serde(default)]
    pub recipient_ids: Vec<i64>,
    pub content_preview: String,
    /// Generated by the server rather than typed by a user
    #[serde(default)]
    pub system: bool,
}

domain_event!(MessageSent, "message.sent.v1");

/// A user's presence changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceChanged {
    #[serde(flatten)]
    pub meta: EventMetadata,
    pub user_id: i64,
    pub previous: PresenceStatus,
    pub status: PresenceStatus,
    /// Friends subscribed to this user's presence
    #[serde(default)]
    pub watcher_ids: Vec<i64>,
}

domain_event!(PresenceChanged, "presence.changed.v1");

/// A call was placed; the signaling relay takes over from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStarted {
    #[serde(flatten)]
    pub meta: EventMetadata,
    pub call_id: Uuid,
    pub caller_id: i64,
    pub callee_id: i64,
    #[serde(default)]
    pub video: bool,
}

domain_event!(CallStarted, "call.started.v1");

/// A file upload finished and was shared into a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileShared {
    #[serde(flatten)]
    pub meta: EventMetadata,
    pub file_id: Uuid,
    pub channel_id: i64,
    pub uploader_id: i64,
    pub file_name: String,
    pub size_bytes: i64,
    #[serde(default)]
    pub recipient_ids: Vec<i64>,
}

domain_event!(FileShared, "file.shared.v1");
