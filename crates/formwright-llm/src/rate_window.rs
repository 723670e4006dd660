//! Sliding window of external generation calls
//!
//! The window records when calls happened and answers "how many in the
//! last N seconds". It never sleeps: [`RateWindow::try_record_at`] either
//! takes a slot under the per-minute ceiling or refuses at once.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default per-minute ceiling for the generative source
pub const DEFAULT_CALLS_PER_MINUTE: usize = 15;

/// Default monitoring window (longest duration callers ask about)
pub const DEFAULT_MONITOR_WINDOW: Duration = Duration::from_secs(5 * 60);

/// One minute, the window the ceiling applies to
pub const MINUTE: Duration = Duration::from_secs(60);

/// Rate window configuration
#[derive(Debug, Clone)]
pub struct RateWindowConfig {
    /// Maximum calls allowed within one minute
    pub calls_per_minute: usize,
    /// Timestamps older than this are pruned
    pub monitor_window: Duration,
}

impl Default for RateWindowConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: DEFAULT_CALLS_PER_MINUTE,
            monitor_window: DEFAULT_MONITOR_WINDOW,
        }
    }
}

/// Process-wide record of generation call timestamps.
///
/// Constructed once at start-up and shared as `Arc<RateWindow>` with every
/// generation call site. The only mutation is append-plus-prune, so a plain
/// mutex held for microseconds is enough.
#[derive(Debug)]
pub struct RateWindow {
    config: RateWindowConfig,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    /// Create a new empty window
    #[must_use]
    pub fn new(config: RateWindowConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// The configured per-minute ceiling
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.config.calls_per_minute
    }

    /// The monitoring window
    #[must_use]
    pub fn monitor_window(&self) -> Duration {
        self.config.monitor_window
    }

    /// Record a call made at `at`.
    ///
    /// Timestamps stay non-decreasing: a timestamp older than the newest
    /// recorded one is clamped up to it.
    pub fn record_call(&self, at: Instant) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let at = match calls.back() {
            Some(&last) if last > at => last,
            _ => at,
        };
        calls.push_back(at);
        Self::prune_locked(&mut calls, at, self.config.monitor_window);
    }

    /// Record a call made now
    pub fn record_now(&self) {
        self.record_call(Instant::now());
    }

    /// Calls recorded within the last `window`
    #[must_use]
    pub fn calls_in_last(&self, window: Duration) -> usize {
        self.calls_in_last_at(window, Instant::now())
    }

    /// Calls recorded within `window` before `now`
    #[must_use]
    pub fn calls_in_last_at(&self, window: Duration, now: Instant) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune_locked(&mut calls, now, self.config.monitor_window);
        match now.checked_sub(window) {
            Some(start) => calls.iter().rev().take_while(|&&t| t > start).count(),
            None => calls.len(),
        }
    }

    /// Whether one more call would push the count within `window` past `ceiling`
    #[must_use]
    pub fn would_exceed(&self, ceiling: usize, window: Duration) -> bool {
        self.would_exceed_at(ceiling, window, Instant::now())
    }

    /// [`would_exceed`](Self::would_exceed) evaluated at `now`
    #[must_use]
    pub fn would_exceed_at(&self, ceiling: usize, window: Duration, now: Instant) -> bool {
        self.calls_in_last_at(window, now) >= ceiling
    }

    /// Record a call at `now` unless the per-minute ceiling is already
    /// reached. Check and record happen under one lock, so concurrent
    /// callers can never overshoot the ceiling.
    pub fn try_record_at(&self, now: Instant) -> bool {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune_locked(&mut calls, now, self.config.monitor_window);
        let recent = match now.checked_sub(MINUTE) {
            Some(start) => calls.iter().rev().take_while(|&&t| t > start).count(),
            None => calls.len(),
        };
        if recent >= self.config.calls_per_minute {
            return false;
        }
        let at = match calls.back() {
            Some(&last) if last > now => last,
            _ => now,
        };
        calls.push_back(at);
        true
    }

    /// [`try_record_at`](Self::try_record_at) now
    pub fn try_record_now(&self) -> bool {
        self.try_record_at(Instant::now())
    }

    /// Whether the configured per-minute ceiling has been reached
    #[must_use]
    pub fn at_ceiling(&self) -> bool {
        self.would_exceed(self.config.calls_per_minute, MINUTE)
    }

    /// Drop timestamps older than the monitoring window
    pub fn prune(&self, now: Instant) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        Self::prune_locked(&mut calls, now, self.config.monitor_window);
    }

    /// Number of timestamps currently retained
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_locked(calls: &mut VecDeque<Instant>, now: Instant, keep: Duration) {
        let Some(cutoff) = now.checked_sub(keep) else {
            return;
        };
        while matches!(calls.front(), Some(&t) if t <= cutoff) {
            calls.pop_front();
        }
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(RateWindowConfig::default())
    }
}

#[cfg(test)]
mod tests;
