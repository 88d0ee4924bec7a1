//! # Domain Events
//!
//! Immutable records of something that happened inside an aggregate, meant
//! for asynchronous consumption through the outbox.
//!
//! Every event carries an [`EventMetadata`] block and a set of type-specific
//! fields. The metadata is flattened into the serialized document so the
//! stored payload is a single flat JSON object:
//!
//! ```text
//! {
//!   "event_id": "0190f3c2-...",
//!   "date_occurred": "2026-01-01T12:00:00Z",
//!   "version": 1,
//!   "entity_id": 42,
//!   "triggered_by": 42,
//!   "friendship_id": 7,
//!   "requester_id": 42,
//!   "addressee_id": 99
//! }
//! ```
//!
//! Two traits split the object-safe side from the static side:
//!
//! - [`DomainEvent`] is what aggregates buffer and handlers receive as
//!   `&dyn DomainEvent`.
//! - [`Event`] adds the stable, versioned type name and the serde bounds
//!   needed to decode a stored payload back into the concrete type.
//!
//! Use [`domain_event!`](crate::domain_event) to implement both for a
//! struct.

mod chat;

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use chat::{
    CallStarted, FileShared, FriendRequestAccepted, FriendRequestSent, MessageSent,
    PresenceChanged,
};

/// Schema version assigned to events that do not specify one.
pub const DEFAULT_EVENT_VERSION: i32 = 1;

fn default_version() -> i32 {
    DEFAULT_EVENT_VERSION
}

/// Metadata shared by every domain event.
///
/// Generated once at construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier (UUIDv7, time ordered)
    pub event_id: Uuid,

    /// When the event was raised (UTC)
    pub date_occurred: DateTime<Utc>,

    /// Payload schema version
    #[serde(default = "default_version")]
    pub version: i32,

    /// Aggregate that raised the event
    #[serde(default)]
    pub entity_id: Option<i64>,

    /// User whose action caused the event
    #[serde(default)]
    pub triggered_by: Option<i64>,
}

impl EventMetadata {
    /// Fresh metadata with a new id, the current time and version 1.
    pub fn new() -> Self {
        Self {
            event_id: Uuid::now_v7(),
            date_occurred: Utc::now(),
            version: DEFAULT_EVENT_VERSION,
            entity_id: None,
            triggered_by: None,
        }
    }

    /// Fresh metadata attributed to an aggregate.
    pub fn for_entity(entity_id: i64) -> Self {
        Self {
            entity_id: Some(entity_id),
            ..Self::new()
        }
    }

    /// Record the acting user.
    pub fn triggered_by(mut self, user_id: i64) -> Self {
        self.triggered_by = Some(user_id);
        self
    }

    /// Override the schema version.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Override the occurrence time.
    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.date_occurred = at;
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe view of a domain event.
pub trait DomainEvent: Any + Send + Sync + fmt::Debug {
    /// Stable, versioned logical name (e.g. `friendship.request_sent.v1`).
    fn event_type(&self) -> &'static str;

    /// Metadata block of this event.
    fn metadata(&self) -> &EventMetadata;

    /// Serialize the full concrete event, including type-specific fields.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Downcast support for typed handlers.
    fn as_any(&self) -> &dyn Any;
}

/// Static side of a domain event: the registered name and serde support.
pub trait Event: DomainEvent + Serialize + DeserializeOwned + Sized {
    /// Stable name stored in the outbox and resolved by the type registry.
    const EVENT_TYPE: &'static str;
}

/// Implement [`Event`] and [`DomainEvent`] for a struct that has a
/// `meta: EventMetadata` field and derives `Serialize`/`Deserialize`.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct TypingStarted {
///     #[serde(flatten)]
///     pub meta: EventMetadata,
///     pub channel_id: i64,
/// }
///
/// domain_event!(TypingStarted, "channel.typing_started.v1");
/// ```
#[macro_export]
macro_rules! domain_event {
    ($ty:ty, $name:literal) => {
        impl $crate::domain::events::Event for $ty {
            const EVENT_TYPE: &'static str = $name;
        }

        impl $crate::domain::events::DomainEvent for $ty {
            fn event_type(&self) -> &'static str {
                $name
            }

            fn metadata(&self) -> &$crate::domain::events::EventMetadata {
                &self.meta
            }

            fn to_payload(
                &self,
            ) -> Result<$crate::__private::serde_json::Value, $crate::__private::serde_json::Error>
            {
                $crate::__private::serde_json::to_value(self)
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}
