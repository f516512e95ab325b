//! Backoff policies: when to stop, and how long to wait between attempts.
//!
//! A policy answers two questions about an [`AttemptSnapshot`]: should the loop stop now, and how
//! long should it wait before the next attempt. Every built-in policy treats a closed snapshot the
//! same way: stop immediately, wait zero.
//!
//! - [`CountLimited`]: stop after `max_attempts`; never waits.
//! - [`FixedInterval`]: waits `backoff_period`; stops once `backoff_period * count` reaches
//!   `limit`.
//! - [`Exponential`]: waits `initial_interval * multiplier^(count - 1)` capped at `limit`; stops
//!   only when interrupted.
//!
//! Defaults (`limit = 30s`, `multiplier = 2.0`) are resolved when the policy is built.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use persevere::policy::{AttemptSnapshot, BackoffPolicy, Exponential};
//!
//! let policy = Exponential::new(Duration::from_millis(500));
//! assert_eq!(policy.delay(&AttemptSnapshot::open(1)), Duration::from_millis(500));
//! assert_eq!(policy.delay(&AttemptSnapshot::open(3)), Duration::from_millis(2000));
//! assert_eq!(policy.delay(&AttemptSnapshot::open(10)), Duration::from_secs(30)); // capped
//! assert!(policy.should_stop(&AttemptSnapshot::closed(3)));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use crate::state::AttemptSnapshot;

/// Ceiling used when `limit` is unset or zero (30 seconds).
pub const DEFAULT_LIMIT: Duration = Duration::from_millis(30_000);

/// Growth factor used when `multiplier` is unset or zero.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Stop/delay strategy consulted by the retry loop.
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
    /// True when no further attempt should be made.
    fn should_stop(&self, attempt: &AttemptSnapshot) -> bool;

    /// Wait before the next attempt. Called after a failed attempt has been counted.
    fn delay(&self, attempt: &AttemptSnapshot) -> Duration;
}

impl<P: BackoffPolicy + ?Sized> BackoffPolicy for Arc<P> {
    fn should_stop(&self, attempt: &AttemptSnapshot) -> bool {
        (**self).should_stop(attempt)
    }

    fn delay(&self, attempt: &AttemptSnapshot) -> Duration {
        (**self).delay(attempt)
    }
}

impl<P: BackoffPolicy + ?Sized> BackoffPolicy for Box<P> {
    fn should_stop(&self, attempt: &AttemptSnapshot) -> bool {
        (**self).should_stop(attempt)
    }

    fn delay(&self, attempt: &AttemptSnapshot) -> Duration {
        (**self).delay(attempt)
    }
}

fn resolve_limit(limit: Duration) -> Duration {
    if limit.is_zero() {
        DEFAULT_LIMIT
    } else {
        limit
    }
}

fn resolve_multiplier(multiplier: f64) -> f64 {
    if multiplier == 0.0 {
        DEFAULT_MULTIPLIER
    } else {
        multiplier
    }
}

/// Stop after a fixed number of attempts; no delay between them.
///
/// `max_attempts = 0` stops before the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountLimited {
    max_attempts: usize,
}

impl CountLimited {
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl BackoffPolicy for CountLimited {
    fn should_stop(&self, attempt: &AttemptSnapshot) -> bool {
        attempt.is_closed() || attempt.count >= self.max_attempts
    }

    fn delay(&self, _attempt: &AttemptSnapshot) -> Duration {
        Duration::ZERO
    }
}

/// Constant delay with a ceiling on the cumulative wait implied by the attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    backoff_period: Duration,
    limit: Duration,
}

impl FixedInterval {
    /// Wait `backoff_period` between attempts, with the default 30s ceiling.
    pub fn new(backoff_period: Duration) -> Self {
        Self { backoff_period, limit: DEFAULT_LIMIT }
    }

    /// Set the ceiling. Zero selects [`DEFAULT_LIMIT`].
    pub fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = resolve_limit(limit);
        self
    }

    pub fn backoff_period(&self) -> Duration {
        self.backoff_period
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl BackoffPolicy for FixedInterval {
    fn should_stop(&self, attempt: &AttemptSnapshot) -> bool {
        if attempt.is_closed() {
            return true;
        }
        let count = u32::try_from(attempt.count).unwrap_or(u32::MAX);
        match self.backoff_period.checked_mul(count) {
            Some(waited) => waited >= self.limit,
            // overflow is past any representable ceiling
            None => true,
        }
    }

    fn delay(&self, attempt: &AttemptSnapshot) -> Duration {
        if attempt.is_closed() {
            Duration::ZERO
        } else {
            self.backoff_period
        }
    }
}

/// Geometric delay growth capped at `limit`. Only an interrupt stops it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    initial_interval: Duration,
    multiplier: f64,
    limit: Duration,
}

impl Exponential {
    /// Start at `initial_interval` with the default multiplier and ceiling.
    pub fn new(initial_interval: Duration) -> Self {
        Self { initial_interval, multiplier: DEFAULT_MULTIPLIER, limit: DEFAULT_LIMIT }
    }

    /// Set the growth factor. Zero selects [`DEFAULT_MULTIPLIER`].
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = resolve_multiplier(multiplier);
        self
    }

    /// Set the delay cap. Zero selects [`DEFAULT_LIMIT`].
    pub fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = resolve_limit(limit);
        self
    }

    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl BackoffPolicy for Exponential {
    fn should_stop(&self, attempt: &AttemptSnapshot) -> bool {
        attempt.is_closed()
    }

    fn delay(&self, attempt: &AttemptSnapshot) -> Duration {
        if attempt.is_closed() {
            return Duration::ZERO;
        }
        let exponent = attempt.count.saturating_sub(1).min(i32::MAX as usize) as i32;
        let nanos = self.initial_interval.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.limit.as_nanos() as f64 {
            return self.limit;
        }
        if nanos <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(nanos as u64)
    }
}
