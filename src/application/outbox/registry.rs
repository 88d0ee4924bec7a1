//! Event Type Registry
//!
//! Explicit mapping from the stable, versioned event name stored in
//! `outbox_messages.event_type` to a function that decodes the stored
//! payload into the concrete event. Built once at startup.
//!
//! Renaming a Rust type does not break stored rows as long as the
//! registered name stays the same. A breaking payload change gets a new
//! name (`message.sent.v2`) and both versions stay registered until the
//! backlog of the old one drains.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::domain::events::{
    CallStarted, DomainEvent, Event, FileShared, FriendRequestAccepted, FriendRequestSent,
    MessageSent, PresenceChanged,
};

type Decoder = fn(serde_json::Value) -> Result<Box<dyn DomainEvent>, serde_json::Error>;

fn decode_as<E: Event>(payload: serde_json::Value) -> Result<Box<dyn DomainEvent>, serde_json::Error> {
    let event: E = serde_json::from_value(payload)?;
    Ok(Box::new(event))
}

/// Errors raised while turning a stored row back into an event.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// No decoder is registered under this name. Retrying cannot help.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Malformed payload for {event_type}: {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Registry of decodable event types.
#[derive(Clone, Default)]
pub struct EventTypeRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl EventTypeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every chat domain event.
    pub fn with_chat_events() -> Self {
        let mut registry = Self::new();
        registry
            .register::<FriendRequestSent>()
            .register::<FriendRequestAccepted>()
            .register::<MessageSent>()
            .register::<PresenceChanged>()
            .register::<CallStarted>()
            .register::<FileShared>();
        registry
    }

    /// Register `E` under `E::EVENT_TYPE`.
    pub fn register<E: Event>(&mut self) -> &mut Self {
        if self.decoders.insert(E::EVENT_TYPE, decode_as::<E>).is_some() {
            warn!(event_type = E::EVENT_TYPE, "Event type registered twice, keeping the last one");
        }
        self
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a stored payload into its concrete event.
    pub fn decode(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Box<dyn DomainEvent>, DecodeError> {
        let decoder = self
            .decoders
            .get(event_type)
            .ok_or_else(|| DecodeError::UnknownEventType(event_type.to_string()))?;

        decoder(payload.clone()).map_err(|source| DecodeError::MalformedPayload {
            event_type: event_type.to_string(),
            source,
        })
    }
}

impl fmt::Debug for EventTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("EventTypeRegistry").field("event_types", &names).finish()
    }
}
