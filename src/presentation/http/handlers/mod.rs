//! HTTP Handlers
//!
//! Request handlers for the admin endpoints.

pub mod health;
pub mod outbox;
