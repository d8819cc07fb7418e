//! Exponential backoff retry policy.
//!
//! Delays are deliberately unjittered: the wait before retry `n` is exactly
//! `base * 2^n`, which destination-side compatibility tests depend on.
//! With the default one-second base the schedule runs 2s, 4s, 8s, 16s, 32s.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest exponent applied to the base delay. Keeps the arithmetic finite
/// for absurd retry counts without affecting any reachable schedule.
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Backoff schedule for a failing destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Base delay doubled on every retry.
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base_delay: Duration::from_secs(1) }
    }
}

impl BackoffPolicy {
    /// Wait duration before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.min(MAX_BACKOFF_EXPONENT);
        self.base_delay * 2_u32.saturating_pow(exponent)
    }
}

/// Retry policy for one destination endpoint.
///
/// `max_retries` counts additional attempts beyond the first: a destination
/// that never succeeds receives `max_retries + 1` requests in total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts allowed after the initial one.
    pub max_retries: u32,

    /// Backoff schedule between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: crate::DEFAULT_MAX_RETRIES, backoff: BackoffPolicy::default() }
    }
}

/// Terminal outcome of delivering to one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The destination accepted the event.
    Delivered {
        /// Number of attempts made, including the successful one
        attempts: u32,
    },
    /// Every allowed attempt failed; delivery was abandoned.
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_matches_compatibility_schedule() {
        let policy = BackoffPolicy::default();

        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(4), Duration::from_secs(16));
        assert_eq!(policy.delay(5), Duration::from_secs(32));
    }

    #[test]
    fn backoff_scales_with_base_delay() {
        let policy = BackoffPolicy { base_delay: Duration::from_millis(250) };
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
    }

    #[test]
    fn backoff_exponent_is_capped() {
        let policy = BackoffPolicy::default();
        // Unreachable with the default retry limit, but must stay finite.
        assert_eq!(policy.delay(u32::MAX), policy.delay(MAX_BACKOFF_EXPONENT));
    }

    #[test]
    fn default_policy_allows_six_total_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
    }
}
