//! Per-peer circuit breaker with a single-trial half-open gate.
//!
//! ```text
//!            failures ≥ threshold                 open_duration elapsed
//!  Closed ───────────────────────▶ Open ───────────────────────────────▶ HalfOpen
//!    ▲                               ▲                                      │
//!    │       trial succeeds          │           trial fails                │
//!    └───────────────────────────────┼──────────────────────────────────────┤
//!                                    └──────────────────────────────────────┘
//! ```
//!
//! While half-open, exactly one request (the trial) may use the peer. Other
//! callers are turned away until the trial is reported. A trial that is
//! never reported expires after `open_duration`, so a lost outcome cannot
//! wedge the peer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Externally visible circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Peer is selectable.
    Closed,
    /// Peer is skipped until `open_duration` has passed.
    Open,
    /// One trial request decides whether the peer comes back.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Cool-down before a trial is allowed, and the lifetime of a trial.
    pub open_duration: Duration,
    /// Successful trials needed to close again.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen { successes: u32, trial: Option<Instant> },
}

impl Phase {
    /// Promote an expired `Open` to `HalfOpen`.
    fn settle(&mut self, now: Instant) -> bool {
        match *self {
            Phase::Open { until } if now >= until => {
                *self = Phase::HalfOpen { successes: 0, trial: None };
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> CircuitState {
        match self {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

/// Thread-safe circuit breaker guarding one peer.
#[derive(Clone)]
pub struct CircuitBreaker {
    peer: Arc<str>,
    config: CircuitBreakerConfig,
    phase: Arc<Mutex<Phase>>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state. `peer` labels log events.
    pub fn new(peer: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            peer: peer.into(),
            config,
            phase: Arc::new(Mutex::new(Phase::Closed { failures: 0 })),
        }
    }

    fn settled(&self) -> parking_lot::MutexGuard<'_, Phase> {
        let mut phase = self.phase.lock();
        if phase.settle(Instant::now()) {
            tracing::info!(peer = %self.peer, "circuit half-open, next request is a trial");
        }
        phase
    }

    pub fn state(&self) -> CircuitState {
        self.settled().state()
    }

    /// `false` only while the circuit is open. Does not take the trial slot.
    pub fn is_allowed(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Claim permission to send one request to the peer.
    ///
    /// Always granted while closed. While half-open, granted to one caller
    /// at a time; the grant is released by `record_success` or
    /// `record_failure`, or lapses after `open_duration`.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut phase = self.settled();
        match &mut *phase {
            Phase::Closed { .. } => true,
            Phase::Open { .. } => false,
            Phase::HalfOpen { trial, .. } => match *trial {
                Some(started) if now.duration_since(started) < self.config.open_duration => false,
                _ => {
                    *trial = Some(now);
                    true
                }
            },
        }
    }

    /// The peer produced an HTTP response.
    pub fn record_success(&self) {
        let mut phase = self.settled();
        match &mut *phase {
            Phase::Closed { failures } => *failures = 0,
            Phase::HalfOpen { successes, trial } => {
                *successes += 1;
                *trial = None;
                if *successes >= self.config.success_threshold {
                    *phase = Phase::Closed { failures: 0 };
                    tracing::info!(peer = %self.peer, "circuit closed");
                }
            }
            Phase::Open { .. } => {}
        }
    }

    /// The peer could not be reached.
    pub fn record_failure(&self) {
        let mut phase = self.settled();
        let until = Instant::now() + self.config.open_duration;
        match &mut *phase {
            Phase::Closed { failures } => {
                *failures += 1;
                if *failures >= self.config.failure_threshold {
                    tracing::warn!(peer = %self.peer, failures = *failures, "circuit opened");
                    *phase = Phase::Open { until };
                }
            }
            Phase::HalfOpen { .. } => {
                tracing::warn!(peer = %self.peer, "trial request failed, circuit re-opened");
                *phase = Phase::Open { until };
            }
            Phase::Open { .. } => {}
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}
