//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Circuit breakers, health probes, the forwarder produce:
//!     → tracing events (structured fields: backend, index, from, to)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every event is tagged with the backend URL
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
