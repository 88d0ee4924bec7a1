//! Presentation Layer
//!
//! Admin HTTP routes: health probes, Prometheus metrics and outbox stats.

pub mod http;
pub mod middleware;
