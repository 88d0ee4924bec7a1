//! System Message Handler
//!
//! When a friend request is accepted, post a "you are now friends" message
//! into the pair's direct channel. Saving the message raises `MessageSent`,
//! which enters the outbox under the message's own transaction.
//!
//! Redelivery is safe: the message is keyed by the accepted event's id and
//! a second save is a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::application::outbox::{HandlerError, NotificationHandler};
use crate::domain::events::FriendRequestAccepted;
use crate::domain::{Message, MessageType, SystemMessageRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

pub const FRIENDSHIP_STARTED_TEXT: &str = "You are now friends. Say hi!";

pub struct SystemMessageHandler {
    messages: Arc<dyn SystemMessageRepository>,
    ids: Arc<SnowflakeGenerator>,
}

impl SystemMessageHandler {
    pub fn new(messages: Arc<dyn SystemMessageRepository>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { messages, ids }
    }
}

fn classify(e: AppError) -> HandlerError {
    match e {
        AppError::Harvest { .. } | AppError::Serialization(_) => HandlerError::Permanent(e.to_string()),
        other => HandlerError::Transient(other.to_string()),
    }
}

#[async_trait]
impl NotificationHandler<FriendRequestAccepted> for SystemMessageHandler {
    fn name(&self) -> &'static str {
        "system_message"
    }

    #[instrument(skip_all, fields(friendship_id = event.friendship_id, event_id = %event.meta.event_id))]
    async fn handle(
        &self,
        event: &FriendRequestAccepted,
        _cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        // Direct channels between friends share the friendship's id
        let mut message = Message::system(
            self.ids.generate(),
            event.friendship_id,
            event.addressee_id,
            FRIENDSHIP_STARTED_TEXT,
            MessageType::FriendshipStarted,
            event.meta.event_id,
            vec![event.requester_id, event.addressee_id],
        );

        if self.messages.save_system_message(&mut message).await.map_err(classify)? {
            info!(message_id = message.id, "Friendship system message posted");
        } else {
            debug!("Friendship system message already posted");
        }
        Ok(())
    }
}
