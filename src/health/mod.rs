//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     One timer task per backend
//!     → GET <backend><path> with a short timeout
//!     → 2xx = healthy; timeout, connect error, non-2xx = unhealthy
//!     → flip entry in state.rs, emit event on change
//!
//! Selection (load_balancer):
//!     → state.rs is_healthy(index), a pure in-memory read
//! ```
//!
//! # Design Decisions
//! - Liveness comes from a dedicated endpoint, never from business traffic;
//!   traffic outcomes feed the circuit breakers instead
//! - No retries: a failed probe waits for the next tick
//! - Health state is per-backend, stored in one shared map

pub mod active;
pub mod state;

pub use active::{HealthMonitor, HealthProbeHandle, ProbeError, ProbeSettings};
pub use state::HealthRecord;
