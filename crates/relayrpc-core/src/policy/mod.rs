//! Reliability policies applied around each outbound peer request.
//!
//! ```text
//! select peer ─▶ [CircuitBreaker per peer] ─▶ GET ─▶ failure? ─▶ [RetryPolicy] ─▶ re-select
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{RetryConfig, RetryPolicy};
