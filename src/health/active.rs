//! Active health probing.
//!
//! # Responsibilities
//! - Run one independent probe task per backend
//! - Map each probe result to healthy/unhealthy in the shared record
//! - Report flips to the observability sink
//! - Stop promptly and cleanly when signalled

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::state::HealthRecord;
use crate::lifecycle::Shutdown;
use crate::load_balancer::backend::{Backend, BackendRegistry};
use crate::observability::metrics;

type ProbeClient = Client<HttpConnector, Body>;

/// Why a single probe counted as unhealthy. All variants are transient.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("non-success status {0}")]
    Status(u16),

    #[error("invalid probe request: {0}")]
    Request(#[from] axum::http::Error),
}

/// Probe timing and target path.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub path: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from(&HealthCheckConfig::default())
    }
}

impl From<&HealthCheckConfig> for ProbeSettings {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
            path: config.path.clone(),
        }
    }
}

/// Starts probe tasks that write into a shared [`HealthRecord`].
pub struct HealthMonitor {
    record: Arc<HealthRecord>,
    settings: ProbeSettings,
    client: ProbeClient,
}

impl HealthMonitor {
    pub fn new(record: Arc<HealthRecord>, settings: ProbeSettings) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            record,
            settings,
            client,
        }
    }

    /// Spawn one probe task per backend. Must be called inside a Tokio runtime.
    pub fn spawn(self, backends: &BackendRegistry) -> HealthProbeHandle {
        let shutdown = Shutdown::new();

        tracing::info!(
            backends = backends.len(),
            interval = ?self.settings.interval,
            timeout = ?self.settings.timeout,
            path = %self.settings.path,
            "Health probes starting"
        );

        let tasks = backends
            .iter()
            .map(|backend| {
                let probe = BackendProbe {
                    backend: backend.clone(),
                    target: backend.endpoint(&self.settings.path),
                    settings: self.settings.clone(),
                    client: self.client.clone(),
                    record: self.record.clone(),
                };
                tokio::spawn(probe.run(shutdown.subscribe()))
            })
            .collect();

        HealthProbeHandle { shutdown, tasks }
    }
}

/// Owner of the running probe tasks.
///
/// Dropping the handle without calling [`HealthProbeHandle::stop`] still
/// stops the tasks, but does not wait for them.
#[derive(Debug)]
pub struct HealthProbeHandle {
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl HealthProbeHandle {
    /// Number of probe tasks started.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signal every probe task and wait for all of them to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Health probe task failed");
            }
        }
        tracing::info!("Health probes stopped");
    }
}

struct BackendProbe {
    backend: Backend,
    target: String,
    settings: ProbeSettings,
    client: ProbeClient,
    record: Arc<HealthRecord>,
}

impl BackendProbe {
    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.settings.interval;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            // An in-flight probe is abandoned on shutdown; nothing is written
            // after the signal is seen.
            let result = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                result = probe(&self.client, &self.target, self.settings.timeout) => result,
            };

            let healthy = match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(backend = %self.backend.label(), error = %e, "Health probe failed");
                    false
                }
            };

            if self.record.set_healthy(self.backend.index, healthy) {
                if healthy {
                    tracing::info!(index = self.backend.index, backend = %self.backend.label(), "Backend is now HEALTHY");
                } else {
                    tracing::warn!(index = self.backend.index, backend = %self.backend.label(), "Backend is now UNHEALTHY");
                }
                metrics::record_backend_health(self.backend.label(), healthy);
            }
        }

        tracing::debug!(backend = %self.backend.label(), "Health probe stopped");
    }
}

/// Issue one liveness request. Only a 2xx answer within `timeout` passes.
pub async fn probe(client: &ProbeClient, target: &str, timeout: Duration) -> Result<(), ProbeError> {
    let request = Request::builder()
        .method("GET")
        .uri(target)
        .header("user-agent", "layer7-lb-health-check")
        .body(Body::empty())?;

    let response = time::timeout(timeout, client.request(request))
        .await
        .map_err(|_| ProbeError::Timeout(timeout))??;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(ProbeError::Status(response.status().as_u16()))
    }
}
