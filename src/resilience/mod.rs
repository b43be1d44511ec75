//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Selection:
//!     → circuit_breaker.rs can_attempt (fail fast while open)
//! Request outcome reported by the forwarder:
//!     → circuit_breaker.rs record_success / record_failure
//! ```
//!
//! # Design Decisions
//! - Circuit breaker prevents cascading failures
//! - The core never retries; retry policy belongs to the forwarder

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitState, Transition};
