//! Infrastructure Layer
//!
//! Implementations of the domain and application ports:
//! - PostgreSQL unit of work, outbox store and system message store
//! - In-memory backend with the same contracts
//! - Redis pub/sub push transport
//! - Prometheus metrics

pub mod database;
pub mod memory;
pub mod metrics;
pub mod push;
