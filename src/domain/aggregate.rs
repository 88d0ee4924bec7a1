//! Aggregate Root
//!
//! Base capability every aggregate shares: an identity, an opaque
//! concurrency token and a buffer of domain events raised during the
//! current business operation.
//!
//! The buffer belongs to the aggregate instance and lives only as long as
//! one unit of work. It is never part of the persisted shape of the
//! aggregate (`#[serde(skip)]`) and is emptied exactly once, when the commit
//! interceptor harvests it.

use std::fmt;

use uuid::Uuid;

use super::events::DomainEvent;

/// Ordered, append-only buffer of pending domain events.
#[derive(Default)]
pub struct EventBuffer {
    pending: Vec<Box<dyn DomainEvent>>,
}

impl EventBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push<E: DomainEvent>(&mut self, event: E) {
        self.pending.push(Box::new(event));
    }

    /// Read-only view in append order.
    pub fn as_slice(&self) -> &[Box<dyn DomainEvent>] {
        &self.pending
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Move the pending events out, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.pending.iter().map(|e| e.event_type()))
            .finish()
    }
}

/// Base trait for every aggregate root.
///
/// Implementors only provide storage for the id, token and buffer; the
/// event accumulator operations are default methods.
pub trait AggregateRoot: Send + Sync {
    /// Aggregate identifier (Snowflake ID)
    fn id(&self) -> i64;

    /// Opaque optimistic concurrency token, rotated on every mutation.
    fn concurrency_token(&self) -> Uuid;

    fn events(&self) -> &EventBuffer;

    fn events_mut(&mut self) -> &mut EventBuffer;

    /// Buffer an event raised by this aggregate.
    fn add_event<E: DomainEvent>(&mut self, event: E)
    where
        Self: Sized,
    {
        self.events_mut().push(event);
    }

    /// Events raised since the last harvest, in append order.
    fn pending_events(&self) -> &[Box<dyn DomainEvent>] {
        self.events().as_slice()
    }

    /// Discard pending events.
    fn clear_events(&mut self) {
        self.events_mut().clear();
    }
}
