//! Circuit breaker guarding the upstream text provider.
//!
//! Tracks consecutive failures and disables provider calls once a
//! threshold is reached, letting a single probe through after a cooldown.
//! The breaker lives in core (not infra) because the responder pipeline
//! depends on it directly.

use std::time::{Duration, Instant};

use serde::Serialize;

use handover_types::provider::ProviderError;

/// Circuit breaker state.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation. Tracks consecutive failures toward the threshold.
    Closed { consecutive_failures: u32 },
    /// Provider is disabled. Will probe after `wait_duration` elapses.
    Open {
        opened_at: Instant,
        wait_duration: Duration,
    },
    /// Probing: one request allowed to test if the provider recovered.
    HalfOpen,
}

/// Health tracking for the upstream text provider.
#[derive(Debug)]
pub struct ProviderBreaker {
    /// Current circuit state.
    pub state: CircuitState,
    /// Last error message from the provider.
    pub last_error: Option<String>,
    /// When the provider last succeeded.
    pub last_success: Option<Instant>,
    /// Total calls routed to the provider.
    pub total_calls: u64,
    /// Total failed calls.
    pub total_failures: u64,
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long to wait in Open state before probing.
    pub open_duration: Duration,
}

impl ProviderBreaker {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
            last_error: None,
            last_success: None,
            total_calls: 0,
            total_failures: 0,
            failure_threshold,
            open_duration,
        }
    }

    /// Check whether the provider may be called right now.
    ///
    /// Transitions Open -> HalfOpen once the wait duration has elapsed, so
    /// the next caller becomes the probe.
    pub fn is_available(&mut self) -> bool {
        match &self.state {
            CircuitState::Closed { .. } => true,
            CircuitState::Open {
                opened_at,
                wait_duration,
            } => {
                if opened_at.elapsed() >= *wait_duration {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    /// Record a successful provider call.
    pub fn record_success(&mut self) {
        self.total_calls += 1;
        self.last_success = Some(Instant::now());
        // Any success closes the circuit and resets the failure count,
        // including a successful HalfOpen probe.
        self.state = CircuitState::Closed {
            consecutive_failures: 0,
        };
    }

    /// Record a failed provider call.
    pub fn record_failure(&mut self, error: &ProviderError) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.last_error = Some(error.to_string());

        match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => {
                let new_count = consecutive_failures + 1;
                if new_count >= self.failure_threshold {
                    self.state = CircuitState::Open {
                        opened_at: Instant::now(),
                        wait_duration: self.open_duration,
                    };
                } else {
                    self.state = CircuitState::Closed {
                        consecutive_failures: new_count,
                    };
                }
            }
            CircuitState::HalfOpen => {
                // Probe failed, reopen for another full cooldown.
                self.state = CircuitState::Open {
                    opened_at: Instant::now(),
                    wait_duration: self.open_duration,
                };
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Snapshot for the stats endpoint.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let (circuit_state, consecutive_failures) = match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => ("closed".to_string(), *consecutive_failures),
            CircuitState::Open { .. } => ("open".to_string(), self.failure_threshold),
            CircuitState::HalfOpen => ("half_open".to_string(), 0),
        };

        BreakerSnapshot {
            circuit_state,
            consecutive_failures,
            last_error: self.last_error.clone(),
            total_calls: self.total_calls,
            total_failures: self.total_failures,
        }
    }
}

/// Point-in-time breaker state for admin dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub circuit_state: String,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub total_calls: u64,
    pub total_failures: u64,
}
