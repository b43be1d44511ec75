//! HTTP server and forwarder.
//!
//! # Responsibilities
//! - Create Axum Router with the liveness route and the proxy fallback
//! - Wire up middleware (trace, request ID)
//! - Ask the dispatcher for a backend and forward the request to it
//! - Bound each upstream exchange by the request timeout
//! - Report each outcome back to the dispatcher and to metrics
//! - Run health probes for the lifetime of the server

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::{ConfigError, LbConfig};
use crate::health::ProbeSettings;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::load_balancer::Dispatcher;
use crate::observability::metrics::{self, Outcome};

/// Hop-by-hop headers are meaningful for one connection only.
const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub client: Client<HttpConnector, Body>,
    /// Upper bound for receiving the upstream response head.
    pub request_timeout: Duration,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
    probe_settings: ProbeSettings,
}

impl HttpServer {
    /// Validate the configuration and build the server from it.
    pub fn new(config: &LbConfig) -> Result<Self, ConfigError> {
        let dispatcher = Arc::new(Dispatcher::from_config(config)?);
        Ok(Self::with_dispatcher(
            dispatcher,
            ProbeSettings::from(&config.health_check),
            Duration::from_secs(config.server.request_timeout_secs),
        ))
    }

    /// Build around an existing dispatcher.
    pub fn with_dispatcher(
        dispatcher: Arc<Dispatcher>,
        probe_settings: ProbeSettings,
        request_timeout: Duration,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState {
            dispatcher: dispatcher.clone(),
            client,
            request_timeout,
        };

        Self {
            router: build_router(state),
            dispatcher,
            probe_settings,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Clone of the router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then stop the probes.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.dispatcher.backends().len(),
            "HTTP server starting"
        );

        let probes = self.dispatcher.start_health_probes(self.probe_settings.clone());

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;

        probes.stop().await;
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .fallback(proxy_handler)
        .with_state(state)
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .layer(TraceLayer::new_for_http())
}

/// Liveness of the load balancer process itself.
async fn liveness_handler() -> &'static str {
    "OK"
}

/// Main proxy handler.
/// Selects a backend, forwards the request, reports the outcome.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let index = state.dispatcher.pick();
    let Some(backend) = state.dispatcher.backend(index) else {
        tracing::error!(index, "Selector returned an unknown backend");
        return (StatusCode::INTERNAL_SERVER_ERROR, "No backend available").into_response();
    };
    let label = backend.label().to_string();
    let request_id = request_id(&request).to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        backend = %label,
        "Proxying request"
    );

    let (mut parts, body) = request.into_parts();
    parts.uri = match upstream_uri(&backend.url, &parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Cannot build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };
    strip_hop_by_hop(&mut parts.headers);
    // Let the client derive Host from the upstream authority.
    parts.headers.remove(header::HOST);

    // Detached so a client hanging up cannot drop the outcome report.
    let exchange = Exchange {
        state,
        index,
        label,
        request_id,
        start,
    };
    match tokio::spawn(exchange.forward(Request::from_parts(parts, body))).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Forwarding task failed");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// One upstream round trip and its outcome bookkeeping.
struct Exchange {
    state: AppState,
    index: usize,
    label: String,
    request_id: String,
    start: Instant,
}

impl Exchange {
    async fn forward(self, request: Request<Body>) -> Response {
        let result =
            tokio::time::timeout(self.state.request_timeout, self.state.client.request(request))
                .await;

        match result {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_server_error() {
                    tracing::warn!(
                        request_id = %self.request_id,
                        backend = %self.label,
                        %status,
                        "Upstream server error"
                    );
                    self.report(Outcome::Failure);
                } else {
                    self.report(Outcome::Success);
                }

                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Ok(Err(e)) => {
                tracing::error!(request_id = %self.request_id, backend = %self.label, error = %e, "Upstream error");
                self.report(Outcome::Failure);
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    backend = %self.label,
                    timeout = ?self.state.request_timeout,
                    "Upstream timed out"
                );
                self.report(Outcome::Failure);
                (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
            }
        }
    }

    fn report(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.state.dispatcher.on_success(self.index),
            Outcome::Failure => self.state.dispatcher.on_failure(self.index),
        }
        metrics::record_request(&self.label, outcome, self.start);
    }
}

/// Rebase the request's path and query onto the backend URL.
fn upstream_uri(base: &Url, original: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{}{}", base.as_str().trim_end_matches('/'), path_and_query).parse()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}
