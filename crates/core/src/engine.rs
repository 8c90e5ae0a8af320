//! Resilience pipeline composer
//!
//! [`ResilienceEngine`] runs an operation through the enabled strategies in a
//! fixed order:
//!
//! ```text
//! Bulkhead -> Rate Limiter -> [Circuit Breaker -> Timeout(attempt)] x Retry -> Fallback
//! ```
//!
//! The bulkhead slot and the rate-limit token are taken once per call, and
//! the slot is held until the call finishes, retries included. Retries of one
//! call therefore never spend extra tokens and are not throttled by the
//! limiter; only the schedule's delays space them out. The breaker
//! check and the deadline apply to every attempt, so a breaker that opens
//! mid-retry stops the remaining attempts. Disabled stages pass through; an
//! empty configuration runs the operation directly, still with panic
//! containment and telemetry.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bulwark_common::resilience::{
    run_fallback, Bulkhead, BulkheadPermit, CircuitBreaker, RetryDecision, RetryPolicy, TimeoutGuard,
    TokenBucket,
};
use bulwark_common::{Clock, ExecutionResult, ResilienceError, ResilienceResult, SystemClock};
use bulwark_domain::constants::DEFAULT_OPERATION_CLASS;
use bulwark_domain::{
    BulkheadSnapshot, CircuitSnapshot, ConfigResult, ErrorKind, EventKind, HealthStats, Outcome,
    ResilienceConfig, StateTransition, TelemetryEvent,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::ports::{NoopSink, TelemetrySink};
use crate::stats::HealthCounters;

/// Clock shared by every stage of an engine
pub type SharedClock = Arc<dyn Clock>;

/// Per-attempt information handed to context-aware operations
#[derive(Debug, Clone)]
pub struct AttemptContext {
    attempt: u32,
    cancellation: CancellationToken,
}

impl AttemptContext {
    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Token cancelled when this attempt runs past its deadline
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Builder for [`ResilienceEngine`]
pub struct EngineBuilder {
    operation_class: String,
    config: ResilienceConfig,
    sink: Option<Arc<dyn TelemetrySink>>,
    clock: Option<SharedClock>,
}

impl EngineBuilder {
    pub fn new(operation_class: impl Into<String>, config: ResilienceConfig) -> Self {
        Self { operation_class: operation_class.into(), config, sink: None, clock: None }
    }

    /// Telemetry sink; defaults to [`NoopSink`]
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Clock for breaker windows and token refill; defaults to the system clock
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and assemble the enabled stages
    pub fn build(self) -> ConfigResult<ResilienceEngine> {
        let Self { operation_class, config, sink, clock } = self;
        config.validate()?;

        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock) as SharedClock);
        let sink = sink.unwrap_or_else(|| Arc::new(NoopSink) as Arc<dyn TelemetrySink>);

        let circuit_breaker = config
            .circuit_breaker
            .clone()
            .map(|breaker| CircuitBreaker::with_clock(breaker, Arc::clone(&clock)))
            .transpose()?;
        let bulkhead = config.bulkhead.clone().map(Bulkhead::new).transpose()?;
        let rate_limiter = config
            .rate_limit
            .clone()
            .map(|limit| TokenBucket::with_clock(limit, Arc::clone(&clock)))
            .transpose()?;
        let retry = config.retry.as_ref().map(RetryPolicy::new);

        debug!(
            operation_class = %operation_class,
            timeout = config.timeout.is_some(),
            retry = retry.is_some(),
            circuit_breaker = circuit_breaker.is_some(),
            bulkhead = bulkhead.is_some(),
            rate_limit = rate_limiter.is_some(),
            "resilience engine created"
        );

        Ok(ResilienceEngine {
            timeout: TimeoutGuard::new(config.timeout),
            operation_class,
            config,
            retry,
            circuit_breaker,
            bulkhead,
            rate_limiter,
            counters: HealthCounters::new(),
            sink,
            clock,
        })
    }
}

/// Runs operations through a fixed resilience pipeline
///
/// One engine guards one operation class. Breaker, bulkhead and limiter
/// state live as long as the engine and are shared by every concurrent
/// caller, so share the engine itself through an `Arc`.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use bulwark_core::ResilienceEngine;
/// use bulwark_domain::{ResilienceConfig, RetryConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ResilienceConfig::new()
///     .with_timeout(Duration::from_secs(2))
///     .with_retry(RetryConfig::default());
/// let engine = ResilienceEngine::new("inventory", config)?;
///
/// let result = engine.run(|| async { Ok::<_, std::io::Error>(7) }).await;
/// assert_eq!(result.value(), Some(&7));
/// # Ok(())
/// # }
/// ```
pub struct ResilienceEngine {
    operation_class: String,
    config: ResilienceConfig,
    timeout: TimeoutGuard,
    retry: Option<RetryPolicy>,
    circuit_breaker: Option<CircuitBreaker<SharedClock>>,
    bulkhead: Option<Bulkhead>,
    rate_limiter: Option<TokenBucket<SharedClock>>,
    counters: HealthCounters,
    sink: Arc<dyn TelemetrySink>,
    clock: SharedClock,
}

impl ResilienceEngine {
    pub fn new(operation_class: impl Into<String>, config: ResilienceConfig) -> ConfigResult<Self> {
        Self::builder(operation_class, config).build()
    }

    pub fn builder(operation_class: impl Into<String>, config: ResilienceConfig) -> EngineBuilder {
        EngineBuilder::new(operation_class, config)
    }

    /// Run `operation` through the pipeline
    ///
    /// `operation` is invoked once per attempt. The call never panics: a
    /// panicking operation yields `Failure(Panicked)`.
    #[instrument(skip_all, fields(operation_class = %self.operation_class))]
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> ExecutionResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let started = self.clock.now();
        let result = self.protected(|_| operation()).await;
        self.complete(started, result)
    }

    /// Run a parameterised operation; every attempt gets a fresh clone of `args`
    #[instrument(skip_all, fields(operation_class = %self.operation_class))]
    pub async fn run_with<A, F, Fut, T, E>(&self, args: A, mut operation: F) -> ExecutionResult<T, E>
    where
        A: Clone,
        F: FnMut(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let started = self.clock.now();
        let result = self.protected(|_| operation(args.clone())).await;
        self.complete(started, result)
    }

    /// Run an operation that wants its [`AttemptContext`]
    ///
    /// The context's cancellation token fires when the attempt times out, so
    /// work the operation hands off elsewhere can stop cooperatively.
    #[instrument(skip_all, fields(operation_class = %self.operation_class))]
    pub async fn run_with_context<F, Fut, T, E>(&self, operation: F) -> ExecutionResult<T, E>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let started = self.clock.now();
        let result = self.protected(operation).await;
        self.complete(started, result)
    }

    /// Run `operation`, falling back to `fallback` on any failure
    ///
    /// The fallback runs after the whole pipeline has failed, rejections
    /// included. It is not guarded by the breaker, deadline or limiter, and
    /// its own outcome becomes the result.
    #[instrument(skip_all, fields(operation_class = %self.operation_class))]
    pub async fn run_with_fallback<F, Fut, G, GFut, T, E>(
        &self,
        mut operation: F,
        fallback: G,
    ) -> ExecutionResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let started = self.clock.now();
        let result = match self.protected(|_| operation()).await {
            Ok(value) => Ok(value),
            Err(error) => {
                debug!(kind = %error.kind(), "pipeline failed, running fallback");
                let fallback_started = self.clock.now();
                let recovered = run_fallback(fallback).await;
                self.emit(
                    EventKind::Fallback,
                    0,
                    self.elapsed_ms(fallback_started),
                    outcome_of(&recovered),
                );
                recovered
            }
        };
        self.complete(started, result)
    }

    pub fn operation_class(&self) -> &str {
        &self.operation_class
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Breaker state, or `None` when no breaker is configured
    pub fn circuit_state(&self) -> Option<CircuitSnapshot> {
        self.circuit_breaker.as_ref().map(|breaker| breaker.snapshot())
    }

    pub fn stats(&self) -> HealthStats {
        self.counters.snapshot()
    }

    /// Success percentage of executed attempts, 100 before any attempt
    pub fn health_score(&self) -> f64 {
        self.stats().health_score()
    }

    pub fn bulkhead_state(&self) -> Option<BulkheadSnapshot> {
        self.bulkhead.as_ref().map(Bulkhead::snapshot)
    }

    pub fn available_tokens(&self) -> Option<f64> {
        self.rate_limiter.as_ref().map(|limiter| limiter.available_tokens())
    }

    /// Open the breaker now; no-op without a breaker
    pub fn force_open(&self) -> Option<StateTransition> {
        let transition = self.circuit_breaker.as_ref()?.force_open()?;
        self.emit_transition(transition, 0, Outcome::Passed);
        Some(transition)
    }

    /// Close the breaker, refill the rate limiter and zero the health counters
    pub fn reset(&self) {
        if let Some(transition) = self.circuit_breaker.as_ref().and_then(|breaker| breaker.reset()) {
            self.emit_transition(transition, 0, Outcome::Passed);
        }
        if let Some(limiter) = &self.rate_limiter {
            limiter.reset();
        }
        self.counters.reset();
        info!(operation_class = %self.operation_class, "resilience engine reset");
    }

    /// Bulkhead, rate limiter, then the attempt loop
    async fn protected<F, Fut, T, E>(&self, mut operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let _slot = self.enter_bulkhead::<E>().await?;
        self.take_token::<E>()?;
        self.attempts(&mut operation).await
    }

    async fn enter_bulkhead<E>(&self) -> ResilienceResult<Option<BulkheadPermit>, E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(bulkhead) = &self.bulkhead else {
            return Ok(None);
        };

        let started = self.clock.now();
        let admitted = bulkhead.acquire::<E>().await;
        if admitted.is_err() {
            self.counters.record_rejection();
        }
        self.emit(EventKind::BulkheadAdmission, 0, self.elapsed_ms(started), outcome_of(&admitted));
        admitted.map(Some)
    }

    fn take_token<E>(&self) -> ResilienceResult<(), E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(limiter) = &self.rate_limiter else {
            return Ok(());
        };

        let taken = limiter.acquire::<E>();
        if taken.is_err() {
            self.counters.record_rejection();
        }
        self.emit(EventKind::RateLimit, 0, 0, outcome_of(&taken));
        taken
    }

    async fn attempts<F, Fut, T, E>(&self, operation: &mut F) -> ResilienceResult<T, E>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt = 1;
        loop {
            let error = match self.attempt(&mut *operation, attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let Some(policy) = &self.retry else {
                return Err(error);
            };
            let (delay, error) = match policy.decide(attempt, error) {
                RetryDecision::Retry { delay, error } => (delay, error),
                RetryDecision::Stop(error) => return Err(error),
            };

            self.emit(
                EventKind::RetryScheduled { delay_ms: millis(delay) },
                attempt,
                0,
                Outcome::Failed(error.kind()),
            );
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// Breaker admission and one deadline-bound invocation
    async fn attempt<F, Fut, T, E>(&self, operation: &mut F, attempt: u32) -> ResilienceResult<T, E>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let permit = match &self.circuit_breaker {
            Some(breaker) => {
                let Some(permit) = breaker.try_acquire() else {
                    self.counters.record_rejection();
                    self.emit(
                        EventKind::CircuitCheck,
                        attempt,
                        0,
                        Outcome::Failed(ErrorKind::CircuitOpen),
                    );
                    return Err(ResilienceError::CircuitOpen);
                };
                if let Some(transition) = permit.transition() {
                    self.emit_transition(transition, attempt, Outcome::Passed);
                }
                self.emit(EventKind::CircuitCheck, attempt, 0, Outcome::Passed);
                Some(permit)
            }
            None => None,
        };

        let cancellation = CancellationToken::new();
        let context = AttemptContext { attempt, cancellation: cancellation.clone() };
        let started = self.clock.now();
        let result = self.timeout.run(|| operation(context), &cancellation).await;
        let outcome = outcome_of(&result);
        self.counters.record_attempt(&result);

        let transition = permit.and_then(|permit| {
            if result.is_ok() {
                permit.record_success()
            } else {
                permit.record_failure()
            }
        });
        self.emit(EventKind::Attempt, attempt, self.elapsed_ms(started), outcome);
        if let Some(transition) = transition {
            self.emit_transition(transition, attempt, outcome);
        }

        result
    }

    fn complete<T, E>(&self, started: Instant, result: ResilienceResult<T, E>) -> ExecutionResult<T, E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let outcome = outcome_of(&result);
        let duration_ms = self.elapsed_ms(started);
        debug!(%outcome, duration_ms, "call completed");
        self.emit(EventKind::CallCompleted, 0, duration_ms, outcome);
        ExecutionResult::from(result)
    }

    fn emit_transition(&self, transition: StateTransition, attempt: u32, outcome: Outcome) {
        self.emit(
            EventKind::CircuitTransition { from: transition.from, to: transition.to },
            attempt,
            0,
            outcome,
        );
    }

    fn emit(&self, kind: EventKind, attempt: u32, duration_ms: u64, outcome: Outcome) {
        let event = TelemetryEvent::new(kind, self.operation_class.as_str(), outcome)
            .with_attempt(attempt)
            .with_duration_ms(duration_ms);
        self.sink.record(&event);
    }

    fn elapsed_ms(&self, started: Instant) -> u64 {
        millis(self.clock.now().saturating_duration_since(started))
    }
}

impl fmt::Debug for ResilienceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceEngine")
            .field("operation_class", &self.operation_class)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Build an engine for the default operation class
pub fn create_resilience_engine(config: ResilienceConfig) -> ConfigResult<ResilienceEngine> {
    ResilienceEngine::new(DEFAULT_OPERATION_CLASS, config)
}

fn outcome_of<T, E>(result: &ResilienceResult<T, E>) -> Outcome
where
    E: std::error::Error + Send + Sync + 'static,
{
    match result {
        Ok(_) => Outcome::Passed,
        Err(error) => Outcome::Failed(error.kind()),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
