//! # Transactional Outbox
//!
//! Write side: [`CommitInterceptor`] harvests aggregate events into the
//! committing transaction.
//!
//! Read side: [`OutboxProcessor`] polls pending rows, resolves them through
//! the [`EventTypeRegistry`] and publishes them on the [`Dispatcher`].

pub mod dispatcher;
pub mod interceptor;
pub mod processor;
pub mod registry;

pub use dispatcher::{DispatchOutcome, Dispatcher, HandlerError, NotificationHandler};
pub use interceptor::CommitInterceptor;
pub use processor::{BatchReport, OutboxProcessor, ProcessorConfig, ProcessorHandle};
pub use registry::{DecodeError, EventTypeRegistry};
