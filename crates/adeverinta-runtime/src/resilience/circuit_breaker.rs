//! Circuit breaker to prevent cascade failures.
//!
//! When a collaborator fails repeatedly, its circuit opens and subsequent
//! calls skip it: retrieval falls back to the lexical index, turns fail fast
//! with a retriable error.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::duration;

/// External collaborators guarded by a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    /// Query embedding for dense retrieval
    Embedding,
    /// Turn interpretation (NLU)
    Interpreter,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::Embedding => write!(f, "embedding"),
            Collaborator::Interpreter => write!(f, "interpreter"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery
    #[serde(with = "duration")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Circuit is open, all calls bypass
    Open { opened_at: Instant },

    /// Testing if circuit can close
    HalfOpen { successes: u32 },
}

/// Circuit breaker with one independent circuit per collaborator.
pub struct CircuitBreaker {
    states: RwLock<HashMap<Collaborator, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns true if calls to the collaborator should be skipped.
    pub fn is_open(&self, collaborator: Collaborator) -> bool {
        let states = self.states.read();
        match states.get(&collaborator) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(collaborator);
                    false
                } else {
                    true
                }
            }
            // Allow test calls
            Some(CircuitState::HalfOpen { .. }) => false,
            _ => false,
        }
    }

    pub fn record_success(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        match states.get(&collaborator).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(collaborator, CircuitState::Closed { failures: 0 });
                    tracing::info!(%collaborator, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        collaborator,
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(collaborator, CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        let failures = match states.get(&collaborator).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    collaborator,
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(%collaborator, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                collaborator,
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(%collaborator, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(collaborator, CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        if matches!(states.get(&collaborator), Some(CircuitState::Open { .. })) {
            states.insert(collaborator, CircuitState::HalfOpen { successes: 0 });
            tracing::info!(%collaborator, "Circuit half-open, testing recovery");
        }
    }

    /// Get current state of a circuit.
    pub fn state(&self, collaborator: Collaborator) -> CircuitState {
        self.states
            .read()
            .get(&collaborator)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
