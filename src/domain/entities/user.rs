//! User aggregate.
//!
//! Maps to the `users` table. Presence, calls, file shares and outgoing
//! friend requests are raised from here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::friendship::{Friendship, FriendshipError};
use crate::domain::aggregate::{AggregateRoot, EventBuffer};
use crate::domain::events::{
    CallStarted, EventMetadata, FileShared, FriendRequestSent, PresenceChanged,
};

/// Presence status matching the database VARCHAR constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Offline,
    Online,
    Idle,
    Dnd,
    Invisible,
}

impl PresenceStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
        }
    }

    /// Status other users are allowed to see. Invisible users look offline.
    pub fn visible(&self) -> Self {
        match self {
            Self::Invisible => Self::Offline,
            other => *other,
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user account.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    pub username: String,

    #[serde(default)]
    pub status: PresenceStatus,

    /// Rotated on every mutation
    pub concurrency_stamp: Uuid,

    pub updated_at: DateTime<Utc>,

    #[serde(skip)]
    events: EventBuffer,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            status: PresenceStatus::Offline,
            concurrency_stamp: Uuid::new_v4(),
            updated_at: Utc::now(),
            events: EventBuffer::new(),
        }
    }

    fn touch(&mut self) {
        self.concurrency_stamp = Uuid::new_v4();
        self.updated_at = Utc::now();
    }

    /// Change presence. Watchers are only notified when the visible status
    /// actually changes.
    pub fn set_presence(&mut self, status: PresenceStatus, watcher_ids: Vec<i64>) {
        let previous = self.status;
        if previous == status {
            return;
        }

        self.status = status;
        self.touch();

        if previous.visible() != status.visible() {
            self.add_event(PresenceChanged {
                meta: EventMetadata::for_entity(self.id).triggered_by(self.id),
                user_id: self.id,
                previous: previous.visible(),
                status: status.visible(),
                watcher_ids,
            });
        }
    }

    /// Open a pending friendship with `addressee_id`.
    ///
    /// The returned friendship row must be persisted in the same unit of
    /// work as this user so the request and its notification commit together.
    pub fn send_friend_request(
        &mut self,
        friendship_id: i64,
        addressee_id: i64,
    ) -> Result<Friendship, FriendshipError> {
        let friendship = Friendship::pending(friendship_id, self.id, addressee_id)?;
        self.touch();

        self.add_event(FriendRequestSent {
            meta: EventMetadata::for_entity(self.id).triggered_by(self.id),
            friendship_id,
            requester_id: self.id,
            addressee_id,
        });

        Ok(friendship)
    }

    /// Place a call. Returns the call id handed to the signaling relay.
    pub fn start_call(&mut self, callee_id: i64, video: bool) -> Uuid {
        let call_id = Uuid::now_v7();
        self.add_event(CallStarted {
            meta: EventMetadata::for_entity(self.id).triggered_by(self.id),
            call_id,
            caller_id: self.id,
            callee_id,
            video,
        });
        call_id
    }

    /// Announce a finished upload to the members of a channel.
    pub fn share_file(
        &mut self,
        file_id: Uuid,
        channel_id: i64,
        file_name: impl Into<String>,
        size_bytes: i64,
        recipient_ids: Vec<i64>,
    ) {
        self.add_event(FileShared {
            meta: EventMetadata::for_entity(self.id).triggered_by(self.id),
            file_id,
            channel_id,
            uploader_id: self.id,
            file_name: file_name.into(),
            size_bytes,
            recipient_ids,
        });
    }
}

impl AggregateRoot for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn concurrency_token(&self) -> Uuid {
        self.concurrency_stamp
    }

    fn events(&self) -> &EventBuffer {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.events
    }
}
