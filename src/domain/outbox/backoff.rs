//! Retry delay policy for failed deliveries.

use std::time::Duration;

/// Linear, capped, jitter-free backoff.
///
/// `delay_for(n) = min(max, base * n)` where `n` is the attempt count
/// after the failure has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub const DEFAULT_BASE: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX: Duration = Duration::from_secs(60);

    /// Creates a policy. The cap wins over the base, even when smaller.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay before the next attempt, given how many attempts have failed.
    pub fn delay_for(&self, attempt_count: u32) -> Duration {
        self.base.saturating_mul(attempt_count).min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_policy_grows_linearly_then_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(29), Duration::from_secs(58));
        assert_eq!(policy.delay_for(30), Duration::from_secs(60));
        assert_eq!(policy.delay_for(31), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn cap_below_base_still_caps() {
        let policy = BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(policy.max(), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(base in 1u64..120, max in 1u64..600, n in 0u32..10_000) {
            let policy = BackoffPolicy::new(Duration::from_secs(base), Duration::from_secs(max));
            prop_assert!(policy.delay_for(n) <= policy.max());
        }

        #[test]
        fn delay_is_monotonic_in_attempts(n in 0u32..10_000) {
            let policy = BackoffPolicy::default();
            prop_assert!(policy.delay_for(n) <= policy.delay_for(n + 1));
        }

        #[test]
        fn delay_is_deterministic(n in 0u32..10_000) {
            let policy = BackoffPolicy::default();
            prop_assert_eq!(policy.delay_for(n), policy.delay_for(n));
        }
    }
}
