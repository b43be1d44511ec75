use axum::{extract::State, http::Uri, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "test-backend")]
#[command(about = "Backend that answers every path with its port and a request counter", long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(default_value_t = 8081)]
    port: u16,
}

#[derive(Clone)]
struct Counter {
    port: u16,
    requests: Arc<AtomicU64>,
}

async fn reply(State(counter): State<Counter>, uri: Uri) -> String {
    let count = counter.requests.fetch_add(1, Ordering::Relaxed) + 1;
    format!(
        "Backend port {} - Request #{} Path: {}\n",
        counter.port,
        count,
        uri.path()
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let state = Counter {
        port: cli.port,
        requests: Arc::new(AtomicU64::new(0)),
    };
    let app = Router::new().fallback(reply).with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Test backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(layer7_lb::lifecycle::shutdown_signal())
        .await?;
    Ok(())
}
