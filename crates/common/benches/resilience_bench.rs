//! Resilience primitive benchmarks
//!
//! Hot paths of the circuit breaker admission, token bucket, retry schedule
//! evaluation and bulkhead acquisition.
//!
//! Run with: `cargo bench --bench resilience_bench -p bulwark-common
//! --features runtime`

use std::time::Duration;

use bulwark_common::resilience::{Bulkhead, CircuitBreaker, TokenBucket};
use bulwark_common::MockClock;
use bulwark_domain::{BulkheadConfig, CircuitBreakerConfig, RateLimitConfig, RetrySchedule};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Builder as RuntimeBuilder;

// ============================================================================
// Circuit Breaker Benchmarks
// ============================================================================

fn bench_circuit_breaker_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker_admission");

    group.bench_function("closed_success", |b| {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default())
            .expect("default breaker config is valid");
        b.iter(|| {
            let permit = breaker.try_acquire().expect("closed breaker admits");
            black_box(permit.record_success());
        });
    });

    group.bench_function("open_short_circuit", |b| {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .open_duration(Duration::from_secs(60))
            .build()
            .expect("valid circuit breaker config for benchmarks");
        let breaker = CircuitBreaker::with_clock(config, clock).expect("valid breaker");
        if let Some(permit) = breaker.try_acquire() {
            permit.record_failure();
        }

        b.iter(|| black_box(breaker.try_acquire().is_none()));
    });

    group.finish();
}

// ============================================================================
// Token Bucket Benchmarks
// ============================================================================

fn bench_token_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_bucket");

    group.bench_function("try_acquire_refilling", |b| {
        let clock = MockClock::new();
        let limiter = TokenBucket::with_clock(RateLimitConfig::new(1_000.0), clock.clone())
            .expect("valid limiter");
        b.iter(|| {
            clock.advance(Duration::from_millis(1));
            black_box(limiter.try_acquire());
        });
    });

    group.finish();
}

// ============================================================================
// Retry Schedule Benchmarks
// ============================================================================

fn bench_schedule_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry_schedule");
    let schedule = RetrySchedule::recurs(10)
        .and(RetrySchedule::exponential(Duration::from_millis(50), 2.0))
        .capped(Duration::from_secs(5));

    for attempt in [1_u32, 5, 10] {
        group.bench_with_input(BenchmarkId::new("delay_for", attempt), &attempt, |b, &attempt| {
            b.iter(|| black_box(schedule.delay_for(black_box(attempt))));
        });
    }

    group.finish();
}

// ============================================================================
// Bulkhead Benchmarks
// ============================================================================

fn bench_bulkhead_acquire(c: &mut Criterion) {
    let runtime = RuntimeBuilder::new_current_thread()
        .enable_time()
        .build()
        .expect("benchmark runtime should build");
    let bulkhead = Bulkhead::new(BulkheadConfig::new(16, 16)).expect("valid bulkhead");

    c.bench_function("bulkhead_acquire_release", |b| {
        b.to_async(&runtime).iter(|| async {
            let permit = bulkhead.acquire::<std::io::Error>().await;
            black_box(permit.is_ok());
        });
    });
}

criterion_group!(
    resilience,
    bench_circuit_breaker_admission,
    bench_token_bucket,
    bench_schedule_evaluation,
    bench_bulkhead_acquire,
);
criterion_main!(resilience);
