//! Retry policy for webhook delivery

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter of up to one backoff unit.
///
/// After the attempt with zero-based number `k` fails, the next attempt waits
/// `base * 2^k + uniform(0, base * 2^k)`, so every delay lies in
/// `[base * 2^k, 2 * base * 2^k)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first included
    pub max_attempts: u32,

    /// Backoff unit
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self { max_attempts, base }
    }

    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Lower bound of the delay that follows failed attempt `attempt`
    pub fn backoff_unit(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    /// Delay to wait after failed attempt `attempt` (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let unit = self.backoff_unit(attempt);
        unit.saturating_add(jitter(unit))
    }

    /// Whether another attempt may follow once `attempts_made` have failed
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Uniform jitter in `[0, unit)`
fn jitter(unit: Duration) -> Duration {
    let nanos = u64::try_from(unit.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}
