//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: next request acts as the recovery probe
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: first can_attempt after open_duration has elapsed
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global), each behind its own mutex
//! - Plain consecutive-failure count; any success resets it
//! - The Open → Half-Open check and transition happen under one lock
//!   acquisition, so concurrent callers cannot both flip the state
//! - Transition events are emitted after the lock is released

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, reported to the observability sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Failure-isolation state machine for a single backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Backend identity used to tag events.
    backend: String,
    failure_threshold: u32,
    open_duration: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker. A zero threshold is treated as 1.
    pub fn new(backend: impl Into<String>, failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            backend: backend.into(),
            failure_threshold: failure_threshold.max(1),
            open_duration,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Whether a request may be sent to this backend right now.
    ///
    /// In Open state this returns true only once the open duration has
    /// elapsed, moving the breaker to Half-Open in the same step.
    pub fn can_attempt(&self) -> bool {
        let (allowed, transition) = self.check_attempt();
        self.emit(transition);
        allowed
    }

    /// Report a successful request.
    pub fn record_success(&self) {
        let transition = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    inner.failure_count = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    inner.failure_count = 0;
                    inner.state = CircuitState::Closed;
                    Some(Transition {
                        from: CircuitState::HalfOpen,
                        to: CircuitState::Closed,
                    })
                }
                // A late success from a request admitted before the trip.
                // Recovery only goes through Half-Open.
                CircuitState::Open => None,
            }
        };
        self.emit(transition);
    }

    /// Report a failed request.
    pub fn record_failure(&self) {
        let transition = {
            let mut inner = self.lock();
            inner.failure_count = inner.failure_count.saturating_add(1);
            match inner.state {
                CircuitState::Closed => {
                    if inner.failure_count >= self.failure_threshold {
                        inner.state = CircuitState::Open;
                        inner.last_failure_at = Some(Instant::now());
                        Some(Transition {
                            from: CircuitState::Closed,
                            to: CircuitState::Open,
                        })
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    inner.state = CircuitState::Open;
                    inner.last_failure_at = Some(Instant::now());
                    Some(Transition {
                        from: CircuitState::HalfOpen,
                        to: CircuitState::Open,
                    })
                }
                CircuitState::Open => {
                    inner.last_failure_at = Some(Instant::now());
                    None
                }
            }
        };
        self.emit(transition);
    }

    fn check_attempt(&self) -> (bool, Option<Transition>) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed > self.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    (
                        true,
                        Some(Transition {
                            from: CircuitState::Open,
                            to: CircuitState::HalfOpen,
                        }),
                    )
                } else {
                    (false, None)
                }
            }
        }
    }

    fn emit(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        match to {
            CircuitState::Open => {
                tracing::warn!(backend = %self.backend, %from, %to, "Circuit opened");
            }
            CircuitState::HalfOpen => {
                tracing::info!(backend = %self.backend, %from, %to, "Circuit half-open, testing recovery");
            }
            CircuitState::Closed => {
                tracing::info!(backend = %self.backend, %from, %to, "Circuit closed, backend recovered");
            }
        }
        metrics::record_circuit_transition(&self.backend, from, to);
    }

    // Every critical section leaves the state consistent, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
