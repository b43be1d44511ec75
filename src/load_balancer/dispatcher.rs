//! Request dispatch core.
//!
//! # Responsibilities
//! - Own every piece of per-backend state for one load balancer instance
//! - Answer `pick()` for the forwarder and take its outcome reports
//! - Start the health probes that feed the shared health record

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigError, LbConfig};
use crate::health::{HealthMonitor, HealthProbeHandle, HealthRecord, ProbeSettings};
use crate::load_balancer::backend::{Backend, BackendRegistry};
use crate::load_balancer::selector::Selector;
use crate::resilience::{CircuitBreaker, CircuitState};

/// Point-in-time view of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub index: usize,
    pub url: String,
    pub weight: u32,
    pub healthy: bool,
    pub circuit: CircuitState,
}

/// Backends, their circuit breakers, the shared health record, and the selector.
///
/// All state is owned here and injected into the parts that need it, so
/// independent instances can coexist in one process.
#[derive(Debug)]
pub struct Dispatcher {
    registry: BackendRegistry,
    breakers: Vec<CircuitBreaker>,
    health: Arc<HealthRecord>,
    selector: Selector,
}

impl Dispatcher {
    /// Build from a registry with one breaker per backend.
    pub fn new(registry: BackendRegistry, failure_threshold: u32, open_duration: Duration) -> Self {
        let breakers = registry
            .iter()
            .map(|b| CircuitBreaker::new(b.label(), failure_threshold, open_duration))
            .collect();
        let health = Arc::new(HealthRecord::new(registry.len()));
        // A registry is never empty.
        let count = NonZeroUsize::new(registry.len()).unwrap_or(NonZeroUsize::MIN);

        Self {
            registry,
            breakers,
            health,
            selector: Selector::new(count),
        }
    }

    /// Validate configuration and build the dispatcher from it.
    pub fn from_config(config: &LbConfig) -> Result<Self, ConfigError> {
        crate::config::validation::validate_config(config).map_err(ConfigError::Validation)?;
        let registry = BackendRegistry::from_config(&config.backends)
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        Ok(Self::new(
            registry,
            config.circuit_breaker.failure_threshold,
            config.circuit_breaker.open_duration(),
        ))
    }

    /// Index of the backend that should serve the next request.
    pub fn pick(&self) -> usize {
        self.selector.pick(&self.health, &self.breakers)
    }

    pub fn backend(&self, index: usize) -> Option<&Backend> {
        self.registry.get(index)
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn breaker(&self, index: usize) -> Option<&CircuitBreaker> {
        self.breakers.get(index)
    }

    pub fn health(&self) -> &Arc<HealthRecord> {
        &self.health
    }

    /// Forwarder callback: the request to `index` succeeded.
    pub fn on_success(&self, index: usize) {
        match self.breakers.get(index) {
            Some(breaker) => breaker.record_success(),
            None => tracing::warn!(index, "Success reported for unknown backend"),
        }
    }

    /// Forwarder callback: the request to `index` failed.
    pub fn on_failure(&self, index: usize) {
        match self.breakers.get(index) {
            Some(breaker) => breaker.record_failure(),
            None => tracing::warn!(index, "Failure reported for unknown backend"),
        }
    }

    /// Spawn one probe task per backend. Must be called inside a Tokio runtime.
    pub fn start_health_probes(&self, settings: ProbeSettings) -> HealthProbeHandle {
        HealthMonitor::new(self.health.clone(), settings).spawn(&self.registry)
    }

    pub fn statuses(&self) -> Vec<BackendStatus> {
        self.registry
            .iter()
            .zip(&self.breakers)
            .map(|(backend, breaker)| BackendStatus {
                index: backend.index,
                url: backend.label().to_string(),
                weight: backend.weight,
                healthy: self.health.is_healthy(backend.index),
                circuit: breaker.state(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn config(count: usize) -> LbConfig {
        let mut config = LbConfig::default();
        config.backends = (0..count)
            .map(|i| BackendConfig::new(format!("http://127.0.0.1:{}", 18000 + i)))
            .collect();
        config.circuit_breaker.failure_threshold = 2;
        config
    }

    #[test]
    fn test_from_config_builds_one_breaker_per_backend() {
        let dispatcher = Dispatcher::from_config(&config(3)).unwrap();
        assert_eq!(dispatcher.backends().len(), 3);
        assert!(dispatcher.breaker(2).is_some());
        assert!(dispatcher.breaker(3).is_none());
        assert_eq!(dispatcher.breaker(1).unwrap().backend(), "http://127.0.0.1:18001");
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let err = Dispatcher::from_config(&config(0)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_outcomes_drive_breakers() {
        let dispatcher = Dispatcher::from_config(&config(2)).unwrap();
        dispatcher.on_failure(0);
        dispatcher.on_failure(0);
        assert_eq!(dispatcher.breaker(0).unwrap().state(), CircuitState::Open);

        // Out-of-range reports are ignored.
        dispatcher.on_failure(9);
        dispatcher.on_success(9);

        for _ in 0..10 {
            assert_eq!(dispatcher.pick(), 1);
        }
    }

    #[test]
    fn test_statuses() {
        let dispatcher = Dispatcher::from_config(&config(2)).unwrap();
        dispatcher.health().set_healthy(1, false);
        dispatcher.on_failure(0);
        dispatcher.on_failure(0);

        let statuses = dispatcher.statuses();
        assert_eq!(
            statuses[0],
            BackendStatus {
                index: 0,
                url: "http://127.0.0.1:18000".into(),
                weight: 1,
                healthy: true,
                circuit: CircuitState::Open,
            }
        );
        assert!(!statuses[1].healthy);
        assert_eq!(statuses[1].circuit, CircuitState::Closed);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Dispatcher::from_config(&config(3)).unwrap();
        let b = Dispatcher::from_config(&config(3)).unwrap();
        assert_eq!(a.pick(), 0);
        assert_eq!(a.pick(), 1);
        assert_eq!(b.pick(), 0);
        a.health().set_healthy(0, false);
        assert!(b.health().is_healthy(0));
    }
}
