//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → dispatcher.rs pick()
//!     → selector.rs (advance cursor, scan for healthy + admitted backend)
//!         - health::HealthRecord::is_healthy
//!         - resilience::CircuitBreaker::can_attempt
//!     → index handed to the forwarder
//! Forwarder outcome
//!     → dispatcher.rs on_success / on_failure → circuit breaker
//! ```
//!
//! # Design Decisions
//! - Selection never fails: with nothing eligible it still returns an index
//! - Health and circuit state are read independently, never jointly
//! - Backend set is fixed at startup (backend.rs registry)
//! - Configured weights are carried but not used for distribution

pub mod backend;
pub mod dispatcher;
pub mod selector;

pub use backend::{Backend, BackendRegistry};
pub use dispatcher::{BackendStatus, Dispatcher};
pub use selector::Selector;
