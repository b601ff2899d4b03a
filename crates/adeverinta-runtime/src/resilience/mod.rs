//! Resilience patterns for collaborator calls.
//!
//! This module provides:
//! - Circuit breaker per collaborator
//! - Retry-once policy for transient provider failures

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Collaborator};
pub use retry::retry_once;
