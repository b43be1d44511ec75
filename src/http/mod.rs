//! HTTP protocol handling subsystem (the forwarder).
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (assign/propagate request ID)
//!     → GET /health answered locally
//!     → anything else: dispatcher pick() → forward → report outcome
//!     → Send backend response (or 502) to client
//! ```

pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
