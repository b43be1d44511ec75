//! layer7-lb
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────┐
//!                      │                   LOAD BALANCER                    │
//!   Client Request     │  ┌─────────┐    ┌────────────┐    ┌───────────┐   │
//!   ───────────────────┼─▶│  http   │───▶│ dispatcher │───▶│ selector  │   │
//!                      │  │ server  │    │   pick()   │    │  cursor   │   │
//!                      │  └────┬────┘    └─────┬──────┘    └─────┬─────┘   │
//!                      │       │               │                 │         │
//!                      │       │         ┌─────▼──────┐   ┌──────▼──────┐  │
//!                      │       │         │  circuit   │   │   health    │  │
//!                      │       │ outcome │  breakers  │   │   record    │◀─┼── probe tasks
//!                      │       └────────▶│ (per node) │   │ (shared)    │  │   (per node)
//!                      │                 └────────────┘   └─────────────┘  │
//!   Client Response    │                                                    │
//!   ◀──────────────────┼── forwarded response / 502                         │──── Backends
//!                      └───────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use layer7_lb::config::load_config;
use layer7_lb::lifecycle::shutdown_signal;
use layer7_lb::observability::{logging, metrics};
use layer7_lb::HttpServer;

#[derive(Parser)]
#[command(name = "layer7-lb", version, about = "Round-robin layer-7 load balancer")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "LB_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Nothing is constructed from an invalid config.
    let config = match load_config(&cli.config) {
        Ok(config) => {
            logging::init_logging(&config.observability.log_level);
            config
        }
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load config");
            return Err(e.into());
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        backends = config.backends.len(),
        failure_threshold = config.circuit_breaker.failure_threshold,
        open_duration_secs = config.circuit_breaker.open_duration_secs,
        probe_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );
    for (index, backend) in config.backends.iter().enumerate() {
        tracing::info!(index, url = %backend.url, weight = backend.weight, "Backend registered");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(&config)?;
    let listener = TcpListener::bind(config.server.bind_address()).await?;

    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
