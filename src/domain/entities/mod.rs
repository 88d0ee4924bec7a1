//! # Domain Entities
//!
//! Aggregates that raise the chat domain events. Each one embeds an
//! [`EventBuffer`](crate::domain::aggregate::EventBuffer) and implements
//! [`AggregateRoot`](crate::domain::aggregate::AggregateRoot).
//!
//! - **User**: presence, calls, file shares and outgoing friend requests
//! - **Friendship**: pending / accepted / declined friendship between two users
//! - **Message**: user and system messages in a channel

mod friendship;
mod message;
mod user;

pub use friendship::{Friendship, FriendshipError, FriendshipStatus};
pub use message::{
    Message, MessageError, MessageType, SystemMessageRepository, MAX_MESSAGE_LENGTH,
    PREVIEW_LENGTH,
};
pub use user::{PresenceStatus, User};
