//! Layer-7 load balancer request-dispatch core.
//!
//! Round-robin selection over a fixed backend set, gated by per-backend
//! health probes and circuit breakers, with a thin HTTP forwarder on top.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::LbConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::Dispatcher;
