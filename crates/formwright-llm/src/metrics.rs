//! Generation call metrics
//!
//! Lock-free counters for every external generation attempt. Time-windowed
//! figures (calls in the last 1/5 minutes) are read from the shared
//! [`RateWindow`] rather than duplicated here.

use crate::rate_window::{RateWindow, MINUTE};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Increment by one
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Running sum and count of call durations, in microseconds
#[derive(Debug, Default)]
struct DurationTotals {
    sum_us: AtomicU64,
    count: AtomicU64,
}

impl DurationTotals {
    fn observe(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn average_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum_us.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
    }
}

/// Metrics for one generation client
#[derive(Debug, Default)]
pub struct GenerationMetrics {
    total_calls: Counter,
    batched_calls: Counter,
    single_field_calls: Counter,
    failed_calls: Counter,
    fallback_only: Counter,
    durations: DurationTotals,
}

impl GenerationMetrics {
    /// Create zeroed metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one external call attempt carrying `field_count` fields.
    pub fn record_call(&self, field_count: usize, elapsed: Duration, succeeded: bool) {
        self.total_calls.inc();
        if field_count > 1 {
            self.batched_calls.inc();
        } else {
            self.single_field_calls.inc();
        }
        if !succeeded {
            self.failed_calls.inc();
        }
        self.durations.observe(elapsed);
    }

    /// Record an invocation answered entirely by local synthesis
    pub fn record_fallback_only(&self) {
        self.fallback_only.inc();
    }

    /// Point-in-time snapshot, combined with the window's recent call counts
    #[must_use]
    pub fn snapshot(&self, window: &RateWindow) -> GenerationStats {
        let last_5 = window.calls_in_last(5 * MINUTE);
        GenerationStats {
            total_calls: self.total_calls.get(),
            batched_calls: self.batched_calls.get(),
            single_field_calls: self.single_field_calls.get(),
            failed_calls: self.failed_calls.get(),
            fallback_only: self.fallback_only.get(),
            calls_last_minute: window.calls_in_last(MINUTE),
            calls_last_5_minutes: last_5,
            average_duration_ms: self.durations.average_ms(),
            estimated_calls_per_minute: last_5 as f64 / 5.0,
            ceiling_per_minute: window.ceiling(),
        }
    }
}

/// Read-only metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStats {
    /// External call attempts, including retries
    pub total_calls: u64,
    /// Attempts that carried more than one field
    pub batched_calls: u64,
    /// Attempts that carried a single field
    pub single_field_calls: u64,
    /// Attempts that failed (error, timeout, unusable response)
    pub failed_calls: u64,
    /// Invocations served without any external call
    pub fallback_only: u64,
    /// Attempts in the last minute
    pub calls_last_minute: usize,
    /// Attempts in the last five minutes
    pub calls_last_5_minutes: usize,
    /// Mean attempt duration
    pub average_duration_ms: f64,
    /// Five-minute count divided by five
    pub estimated_calls_per_minute: f64,
    /// Configured per-minute ceiling
    pub ceiling_per_minute: usize,
}
