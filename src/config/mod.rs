//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LbConfig (validated, immutable)
//!     → consumed once to build the dispatcher and server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend set never changes at runtime
//! - All fields except the backend list have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any error is fatal: nothing is constructed from an invalid config

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, CircuitBreakerConfig, HealthCheckConfig, LbConfig, ObservabilityConfig,
    ServerConfig,
};
pub use validation::ValidationError;
