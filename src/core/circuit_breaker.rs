//! Circuit Breaker Implementation
//!
//! One breaker per logical service guards the proxy call primitive. The breaker follows
//! the usual three-state machine:
//!
//! - **Closed**: calls pass through, consecutive failures are counted
//! - **Open**: calls fail fast with `CircuitOpen` until the open duration elapses
//! - **HalfOpen**: calls pass through again; enough successes close the circuit,
//!   a single failure re-opens it
//!
//! Every transition into `Open` is a "trip" and is reported back to the caller so the
//! statistics collector can maintain `per_service.circuit_trips`.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state machine
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerState {
    /// Tracks the number of consecutive failures
    Closed { failure_count: u32 },

    /// Records when the circuit was opened
    Open { opened_at: Instant },

    /// Tracks successful calls since the circuit left `Open`
    HalfOpen { success_count: u32 },
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Disabled breakers never reject and never trip
    pub enabled: bool,

    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// How long to wait before transitioning from Open to HalfOpen
    #[serde(with = "humantime_serde")]
    pub open_duration: Duration,

    /// Number of successful calls needed in HalfOpen to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Breaker guarding calls to a single service
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<CircuitBreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(CircuitBreakerState::Closed { failure_count: 0 }),
        }
    }

    /// Check if a call may proceed, moving Open to HalfOpen once the open duration elapsed
    pub fn try_acquire(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut state = self.state.lock();
        match *state {
            CircuitBreakerState::Closed { .. } | CircuitBreakerState::HalfOpen { .. } => true,
            CircuitBreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.open_duration {
                    *state = CircuitBreakerState::HalfOpen { success_count: 0 };
                    info!(service = %self.name, "Circuit breaker half-open, probing upstream");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }

        let mut state = self.state.lock();
        match *state {
            CircuitBreakerState::Closed { .. } => {
                *state = CircuitBreakerState::Closed { failure_count: 0 };
            }
            CircuitBreakerState::Open { .. } => {}
            CircuitBreakerState::HalfOpen { success_count } => {
                let success_count = success_count + 1;
                if success_count >= self.config.success_threshold {
                    *state = CircuitBreakerState::Closed { failure_count: 0 };
                    info!(service = %self.name, "Circuit breaker closed");
                } else {
                    *state = CircuitBreakerState::HalfOpen { success_count };
                }
            }
        }
    }

    /// Record a failed call; returns `true` when this failure tripped the circuit open
    pub fn record_failure(&self) -> bool {
        if !self.config.enabled {
            return false;
        }

        let mut state = self.state.lock();
        let tripped = match *state {
            CircuitBreakerState::Closed { failure_count } => {
                let failure_count = failure_count + 1;
                if failure_count >= self.config.failure_threshold {
                    true
                } else {
                    *state = CircuitBreakerState::Closed { failure_count };
                    false
                }
            }
            CircuitBreakerState::Open { .. } => false,
            CircuitBreakerState::HalfOpen { .. } => true,
        };

        if tripped {
            *state = CircuitBreakerState::Open {
                opened_at: Instant::now(),
            };
            warn!(service = %self.name, "Circuit breaker opened");
        }
        tripped
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.state.lock().clone()
    }
}

/// Lazily-populated breakers keyed by service name
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker for a service
    pub fn for_service(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(service) {
            return Arc::clone(&breaker);
        }
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.config.clone())))
            .clone()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
