//! Message aggregate and system-message repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregate::{AggregateRoot, EventBuffer};
use crate::domain::events::{EventMetadata, MessageSent};
use crate::shared::error::AppError;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Length of the preview carried in `MessageSent` notifications.
pub const PREVIEW_LENGTH: usize = 120;

/// Message types stored in the `message_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A regular user message
    #[default]
    Default,
    /// Two users became friends
    FriendshipStarted,
    /// A voice/video call was started
    Call,
}

impl MessageType {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::FriendshipStarted => "friendship_started",
            Self::Call => "call",
        }
    }

    /// Check if this is a system message type.
    pub fn is_system(&self) -> bool {
        !matches!(self, Self::Default)
    }
}

/// Message validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("Message content is empty")]
    Empty,

    #[error("Message too long")]
    ContentTooLong,
}

/// A message in a channel.
#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    pub channel_id: i64,

    pub author_id: i64,

    pub content: String,

    #[serde(default)]
    pub message_type: MessageType,

    /// Event that produced this message, for server-generated messages.
    /// Unique, so a redelivered event cannot create a second message.
    pub source_event_id: Option<Uuid>,

    pub concurrency_stamp: Uuid,

    pub created_at: DateTime<Utc>,

    #[serde(skip)]
    events: EventBuffer,
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_LENGTH).collect()
}

impl Message {
    /// Post a user message and raise `MessageSent` for the recipients.
    pub fn post(
        id: i64,
        channel_id: i64,
        author_id: i64,
        content: impl Into<String>,
        recipient_ids: Vec<i64>,
    ) -> Result<Self, MessageError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MessageError::Empty);
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(MessageError::ContentTooLong);
        }

        let mut message = Self::build(id, channel_id, author_id, content, MessageType::Default, None);
        message.raise_sent(recipient_ids, Some(author_id));
        Ok(message)
    }

    /// Server-generated message caused by another event.
    pub fn system(
        id: i64,
        channel_id: i64,
        author_id: i64,
        content: impl Into<String>,
        message_type: MessageType,
        source_event_id: Uuid,
        recipient_ids: Vec<i64>,
    ) -> Self {
        let mut message = Self::build(
            id,
            channel_id,
            author_id,
            content.into(),
            message_type,
            Some(source_event_id),
        );
        message.raise_sent(recipient_ids, None);
        message
    }

    fn build(
        id: i64,
        channel_id: i64,
        author_id: i64,
        content: String,
        message_type: MessageType,
        source_event_id: Option<Uuid>,
    ) -> Self {
        Self {
            id,
            channel_id,
            author_id,
            content,
            message_type,
            source_event_id,
            concurrency_stamp: Uuid::new_v4(),
            created_at: Utc::now(),
            events: EventBuffer::new(),
        }
    }

    fn raise_sent(&mut self, recipient_ids: Vec<i64>, triggered_by: Option<i64>) {
        let mut meta = EventMetadata::for_entity(self.id);
        meta.triggered_by = triggered_by;

        let event = MessageSent {
            meta,
            message_id: self.id,
            channel_id: self.channel_id,
            author_id: self.author_id,
            recipient_ids,
            content_preview: preview(&self.content),
            system: self.message_type.is_system(),
        };
        self.add_event(event);
    }
}

impl AggregateRoot for Message {
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

/// Persistence of server-generated messages.
///
/// Implementations insert with set semantics keyed by `source_event_id`
/// and run the outbox harvest in the same transaction, so the chained
/// `MessageSent` event is enqueued only when the message is new.
#[async_trait]
pub trait SystemMessageRepository: Send + Sync {
    /// Returns `false` when a message for the same source event already exists.
    async fn save_system_message(&self, message: &mut Message) -> Result<bool, AppError>;
}
