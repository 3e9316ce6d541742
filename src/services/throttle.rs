//! Minimum-interval gate for outbound calls
//!
//! A [`Throttle`] lets at most one remote call through per interval. The
//! caller passes `now` explicitly so the gate can be driven by a
//! [`ManualClock`] in tests. An attempt that is let through claims the window
//! before the work runs, so a failing upstream cannot be hammered and an
//! overlapping call sees the claim and backs off.

use crate::utils::safe_mutex_lock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Source of monotonic time for the gate
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *safe_mutex_lock(&self.offset, "manual clock") += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *safe_mutex_lock(&self.offset, "manual clock")
    }
}

/// Pure gate check: may a call at `now` go through?
pub fn should_attempt(now: Instant, last_attempt: Option<Instant>, min_interval: Duration) -> bool {
    match last_attempt {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= min_interval,
    }
}

/// Why an attempt did not run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Inside the minimum interval of the previous attempt
    TooSoon { retry_in: Duration },
    /// Another attempt has not finished yet
    InFlight,
}

/// Outcome of [`Throttle::attempt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Completed(T),
    Skipped(SkipReason),
}

impl<T> Attempt<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Attempt::Skipped(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Attempt::Completed(value) => Some(value),
            Attempt::Skipped(_) => None,
        }
    }
}

/// Mutable part of the gate
#[derive(Debug, Clone, Default)]
pub struct ThrottleState {
    /// Start of the most recent attempt that was let through
    pub last_attempt: Option<Instant>,
    /// An attempt is currently running
    pub in_flight: bool,
}

/// Gate counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleStats {
    pub attempts: u64,
    pub skipped: u64,
}

/// Minimum-interval, single-flight gate
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    state: Mutex<ThrottleState>,
    attempts: AtomicU64,
    skipped: AtomicU64,
}

/// Clears the in-flight flag even if the attempt future is dropped midway
struct InFlightGuard<'a> {
    throttle: &'a Throttle,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        safe_mutex_lock(&self.throttle.state, "throttle").in_flight = false;
    }
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(ThrottleState::default()),
            attempts: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn state(&self) -> ThrottleState {
        safe_mutex_lock(&self.state, "throttle").clone()
    }

    pub fn stats(&self) -> ThrottleStats {
        ThrottleStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    /// Run `work` unless the previous attempt was less than the minimum
    /// interval ago or is still running
    pub async fn attempt<F, Fut, T>(&self, now: Instant, work: F) -> Attempt<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.run(now, true, work).await
    }

    /// Run `work` regardless of the interval; still single-flight
    pub async fn attempt_now<F, Fut, T>(&self, now: Instant, work: F) -> Attempt<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.run(now, false, work).await
    }

    async fn run<F, Fut, T>(&self, now: Instant, enforce_interval: bool, work: F) -> Attempt<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Err(reason) = self.claim(now, enforce_interval) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            trace!(reason = ?reason, "Attempt skipped");
            return Attempt::Skipped(reason);
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        let _guard = InFlightGuard { throttle: self };
        Attempt::Completed(work().await)
    }

    fn claim(&self, now: Instant, enforce_interval: bool) -> Result<(), SkipReason> {
        let mut state = safe_mutex_lock(&self.state, "throttle");

        if state.in_flight {
            return Err(SkipReason::InFlight);
        }

        if enforce_interval && !should_attempt(now, state.last_attempt, self.min_interval) {
            let elapsed = state
                .last_attempt
                .map(|last| now.saturating_duration_since(last))
                .unwrap_or_default();
            return Err(SkipReason::TooSoon {
                retry_in: self.min_interval.saturating_sub(elapsed),
            });
        }

        state.last_attempt = Some(now);
        state.in_flight = true;
        debug!(
            min_interval_secs = self.min_interval.as_secs(),
            "Attempt allowed"
        );
        Ok(())
    }
}
