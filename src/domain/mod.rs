//! # Domain Layer
//!
//! Aggregates, domain events and the contracts of the outbox pipeline.
//! Independent of any storage or transport.
//!
//! ## Structure
//!
//! - **aggregate**: `AggregateRoot` and the per-aggregate `EventBuffer`
//! - **events**: `DomainEvent`, `EventMetadata` and the chat events
//! - **entities**: User, Friendship and Message aggregates
//! - **outbox**: `OutboxMessage`, `OutboxStore` and `UnitOfWork`

pub mod aggregate;
pub mod entities;
pub mod events;
pub mod outbox;

// Re-export commonly used types
pub use aggregate::{AggregateRoot, EventBuffer};
pub use entities::*;
pub use events::{DomainEvent, Event, EventMetadata};
pub use outbox::{
    OutboxMessage, OutboxStats, OutboxStatus, OutboxStore, RowOutcome, RowUpdate, UnitOfWork,
};
