//! Circuit breaker state machine
//!
//! The breaker protects a dependency by counting consecutive failures. After
//! `failure_threshold` of them it opens and rejects every attempt for
//! `open_duration`. The first admission after that window moves it to
//! half-open and lets exactly one probe through; `success_threshold`
//! consecutive probe successes close it again, any probe failure reopens it.
//!
//! All state lives behind one lock so the read-then-transition step of an
//! admission is atomic. Admission hands out a [`CircuitPermit`] which must be
//! settled with [`CircuitPermit::record_success`] or
//! [`CircuitPermit::record_failure`]. A permit remembers the generation it was
//! issued in; outcomes reported after the breaker has already transitioned
//! are ignored, and a permit dropped without an outcome frees the probe slot.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bulwark_domain::{CircuitBreakerConfig, CircuitSnapshot, CircuitState, ConfigResult, StateTransition};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{ResilienceError, ResilienceResult};

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    generation: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            probe_in_flight: false,
            generation: 0,
        }
    }

    /// Move to `to`, resetting counters and the probe slot
    fn transition(&mut self, to: CircuitState, now: Instant) -> StateTransition {
        let from = self.state;
        self.state = to;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.probe_in_flight = false;
        self.opened_at = (to == CircuitState::Open).then_some(now);
        self.generation = self.generation.wrapping_add(1);
        StateTransition::new(from, to)
    }

    fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
        }
    }
}

/// Generic circuit breaker
///
/// Cloning shares state: every clone observes and drives the same circuit.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &snapshot.state)
            .field("consecutive_failures", &snapshot.consecutive_failures)
            .field("consecutive_successes", &snapshot.consecutive_successes)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a circuit breaker reading the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self { config, inner: Arc::new(Mutex::new(BreakerState::new())), clock: Arc::new(clock) })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether an admission right now would be granted
    ///
    /// Pure predicate: never changes state. An open circuit whose window has
    /// elapsed reports `true` because the next admission will probe.
    pub fn is_allowed(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.window_elapsed(&inner, self.clock.now()),
            CircuitState::HalfOpen => !inner.probe_in_flight,
        }
    }

    /// Admit one attempt, performing the open to half-open move if due
    ///
    /// Returns `None` when the attempt must be rejected with `CircuitOpen`.
    pub fn try_acquire(&self) -> Option<CircuitPermit<'_, C>> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();

        match inner.state {
            CircuitState::Closed => Some(self.permit(inner.generation, false, None)),
            CircuitState::Open => {
                if !self.window_elapsed(&inner, now) {
                    debug!(state = %inner.state, "circuit breaker rejecting attempt");
                    return None;
                }
                let transition = inner.transition(CircuitState::HalfOpen, now);
                inner.probe_in_flight = true;
                info!(from = %transition.from, to = %transition.to, "circuit breaker admitting probe");
                Some(self.permit(inner.generation, true, Some(transition)))
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    debug!("circuit breaker probe already in flight, rejecting attempt");
                    return None;
                }
                inner.probe_in_flight = true;
                Some(self.permit(inner.generation, true, None))
            }
        }
    }

    /// Execute an operation with circuit breaker protection
    #[instrument(skip(self, operation), fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(permit) = self.try_acquire() else {
            return Err(ResilienceError::CircuitOpen);
        };

        match operation().await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(error) => {
                permit.record_failure();
                Err(ResilienceError::operation(error))
            }
        }
    }

    /// Current state without performing any transition
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        self.inner.lock().snapshot()
    }

    /// Open the circuit now, restarting the open window
    ///
    /// Returns the transition if the state changed.
    pub fn force_open(&self) -> Option<StateTransition> {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        let transition = inner.transition(CircuitState::Open, self.clock.now());
        warn!(from = %previous, "circuit breaker forced open");
        (previous != CircuitState::Open).then_some(transition)
    }

    /// Close the circuit and clear all counters
    ///
    /// Returns the transition if the state changed.
    pub fn reset(&self) -> Option<StateTransition> {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        let transition = inner.transition(CircuitState::Closed, self.clock.now());
        info!(from = %previous, "circuit breaker manually reset to closed state");
        (previous != CircuitState::Closed).then_some(transition)
    }

    fn window_elapsed(&self, inner: &BreakerState, now: Instant) -> bool {
        inner
            .opened_at
            .map_or(true, |opened| now.saturating_duration_since(opened) >= self.config.open_duration)
    }

    fn permit(
        &self,
        generation: u64,
        probe: bool,
        transition: Option<StateTransition>,
    ) -> CircuitPermit<'_, C> {
        CircuitPermit { breaker: self, generation, probe, transition, settled: false }
    }

    fn on_success(&self, generation: u64, probe: bool) -> Option<StateTransition> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!("ignoring success reported for a previous circuit generation");
            return None;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                if probe {
                    inner.probe_in_flight = false;
                }
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    let successes = inner.consecutive_successes;
                    let transition = inner.transition(CircuitState::Closed, self.clock.now());
                    info!(successes, "circuit breaker closed");
                    Some(transition)
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    fn on_failure(&self, generation: u64) -> Option<StateTransition> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!("ignoring failure reported for a previous circuit generation");
            return None;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    let failures = inner.consecutive_failures;
                    let transition = inner.transition(CircuitState::Open, self.clock.now());
                    warn!(failures, "circuit breaker opened");
                    Some(transition)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                let transition = inner.transition(CircuitState::Open, self.clock.now());
                warn!("circuit breaker reopened after failed probe");
                Some(transition)
            }
            CircuitState::Open => None,
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`]
#[must_use = "a permit must be settled with record_success or record_failure"]
pub struct CircuitPermit<'a, C: Clock = SystemClock> {
    breaker: &'a CircuitBreaker<C>,
    generation: u64,
    probe: bool,
    transition: Option<StateTransition>,
    settled: bool,
}

impl<C: Clock> CircuitPermit<'_, C> {
    /// Whether this permit is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Transition performed while admitting this permit (open to half-open)
    pub fn transition(&self) -> Option<StateTransition> {
        self.transition
    }

    pub fn record_success(mut self) -> Option<StateTransition> {
        self.settled = true;
        self.breaker.on_success(self.generation, self.probe)
    }

    pub fn record_failure(mut self) -> Option<StateTransition> {
        self.settled = true;
        self.breaker.on_failure(self.generation)
    }
}

impl<C: Clock> Drop for CircuitPermit<'_, C> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(self.generation);
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitPermit<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitPermit")
            .field("generation", &self.generation)
            .field("probe", &self.probe)
            .field("transition", &self.transition)
            .finish()
    }
}
