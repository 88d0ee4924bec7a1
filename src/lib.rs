//! # Chat Outbox Library
//!
//! Transactional outbox and domain-event dispatch for the chat server:
//! - Aggregates buffer the domain events they raise
//! - The commit interceptor stores those events in the committing transaction
//! - A background processor polls the outbox and fans events out to
//!   in-process handlers, at least once, with bounded retries
//!
//! ## Module Structure
//!
//! ```text
//! chat_outbox/
//! +-- config/         Configuration management
//! +-- domain/         Aggregates, domain events, outbox model and traits
//! +-- application/    Commit interceptor, registry, dispatcher, processor, handlers
//! +-- infrastructure/ PostgreSQL, in-memory backend, Redis push, metrics
//! +-- presentation/   Admin HTTP routes
//! +-- shared/         Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - aggregates and events
pub mod domain;

// Application layer - outbox pipeline and handlers
pub mod application;

// Infrastructure layer - storage and transports
pub mod infrastructure;

// Presentation layer - admin HTTP surface
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
