//! # Notification Handlers
//!
//! Side effects run by the dispatcher for delivered outbox messages.
//!
//! - **push**: real-time push to the affected users via [`PushNotifier`]
//! - **system_message**: server-generated messages that chain new events

pub mod push;
pub mod system_message;

pub use push::{PushError, PushNotification, PushNotificationHandler, PushNotifier};
pub use system_message::SystemMessageHandler;
