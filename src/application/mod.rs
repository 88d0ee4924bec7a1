//! Application Layer
//!
//! The outbox pipeline and the notification handlers it dispatches to.
//! Depends on the domain layer only; storage and transports are reached
//! through the traits the domain and handler modules define.

pub mod handlers;
pub mod outbox;
