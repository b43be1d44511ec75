//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build dispatcher → Start probes → Serve
//!
//! Shutdown:
//!     Signal received (signals.rs) → Stop accepting → Stop probes (shutdown.rs) → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: a configuration error aborts before anything is constructed
//! - Probe tasks are cancelled and joined, never left running unmanaged

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
