//! Middleware
//!
//! Tower middleware for request processing.

pub mod logging;
