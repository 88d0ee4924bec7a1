//! Friendship aggregate.
//!
//! Maps to the `friendships` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregate::{AggregateRoot, EventBuffer};
use crate::domain::events::{EventMetadata, FriendRequestAccepted};

/// Friendship state matching the database VARCHAR constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Declined,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

/// Friendship transition errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FriendshipError {
    #[error("Cannot send a friend request to yourself")]
    SelfRequest,

    #[error("Only the addressee can answer a friend request")]
    NotAddressee,

    #[error("Friend request is already {0}")]
    AlreadyAnswered(&'static str),
}

/// A friendship between two users.
#[derive(Debug, Serialize, Deserialize)]
pub struct Friendship {
    pub id: i64,
    pub requester_id: i64,
    pub addressee_id: i64,
    pub status: FriendshipStatus,
    pub concurrency_stamp: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip)]
    events: EventBuffer,
}

impl Friendship {
    /// New pending friendship. The request event itself is raised by the
    /// requesting user (see `User::send_friend_request`).
    pub fn pending(id: i64, requester_id: i64, addressee_id: i64) -> Result<Self, FriendshipError> {
        if requester_id == addressee_id {
            return Err(FriendshipError::SelfRequest);
        }

        let now = Utc::now();
        Ok(Self {
            id,
            requester_id,
            addressee_id,
            status: FriendshipStatus::Pending,
            concurrency_stamp: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            events: EventBuffer::new(),
        })
    }

    fn answer(&mut self, by_user: i64, status: FriendshipStatus) -> Result<(), FriendshipError> {
        if by_user != self.addressee_id {
            return Err(FriendshipError::NotAddressee);
        }
        if self.status != FriendshipStatus::Pending {
            return Err(FriendshipError::AlreadyAnswered(self.status.as_str()));
        }

        self.status = status;
        self.concurrency_stamp = Uuid::new_v4();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Accept the request on behalf of the addressee.
    pub fn accept(&mut self, by_user: i64) -> Result<(), FriendshipError> {
        self.answer(by_user, FriendshipStatus::Accepted)?;

        self.add_event(FriendRequestAccepted {
            meta: EventMetadata::for_entity(self.id).triggered_by(by_user),
            friendship_id: self.id,
            requester_id: self.requester_id,
            addressee_id: self.addressee_id,
        });
        Ok(())
    }

    /// Decline the request. Declines are silent: nobody is notified.
    pub fn decline(&mut self, by_user: i64) -> Result<(), FriendshipError> {
        self.answer(by_user, FriendshipStatus::Declined)
    }
}

impl AggregateRoot for Friendship {
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
