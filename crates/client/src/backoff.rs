//! Reconnect delay policy.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with a cap and a bounded attempt budget.
///
/// The delay before attempt `n` (1-based) is `min(base · 2^(n-1), cap)`
/// plus up to one second of jitter, so a fleet of clients losing the same
/// hub does not reconnect in lockstep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on the un-jittered delay.
    pub cap: Duration,
    /// Failed attempts that still schedule a retry; the next consecutive
    /// failure is terminal.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Whether `attempt` (1-based) is still within the budget.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// The deterministic part of the delay before `attempt` (1-based).
    #[must_use]
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.cap)
    }

    /// The full delay before `attempt`: [`Self::raw_delay`] plus jitter in
    /// `[0, 1s)`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
        self.raw_delay(attempt) + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_double_raw_delay_per_attempt() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.raw_delay(1), Duration::from_secs(1));
        assert_eq!(policy.raw_delay(2), Duration::from_secs(2));
        assert_eq!(policy.raw_delay(3), Duration::from_secs(4));
        assert_eq!(policy.raw_delay(4), Duration::from_secs(8));
        assert_eq!(policy.raw_delay(5), Duration::from_secs(16));
    }

    #[test]
    fn should_cap_raw_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.raw_delay(6), Duration::from_secs(30));
        assert_eq!(policy.raw_delay(60), Duration::from_secs(30));
    }

    #[test]
    fn should_keep_jitter_under_one_second() {
        let policy = BackoffPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(3);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay < Duration::from_secs(5));
        }
    }

    #[test]
    fn should_exhaust_budget_after_max_attempts() {
        let policy = BackoffPolicy::default();
        assert!(policy.allows(1));
        assert!(policy.allows(5));
        assert!(!policy.allows(6));
    }
}
