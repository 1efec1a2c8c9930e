//! Retry policy for step dispatch.
//!
//! Retries are fixed-delay with no backoff multiplier. Only driver errors
//! (including per-attempt timeouts) are retried; template errors and
//! validation mismatches never are.

use std::time::Duration;

use interlock_types::workflow::StepErrorPolicy;

/// Stateless retry handler. All logic lives in associated functions that
/// take the step's policy as a parameter.
pub struct RetryHandler;

impl RetryHandler {
    /// Total attempts allowed: the first try plus `max_retries`.
    pub fn max_attempts(policy: &StepErrorPolicy) -> u32 {
        policy.max_retries.saturating_add(1)
    }

    /// Whether another attempt follows a failed `attempt` (1-based).
    pub fn should_retry(policy: &StepErrorPolicy, attempt: u32) -> bool {
        attempt < Self::max_attempts(policy)
    }

    /// Delay before the next attempt.
    pub fn delay(policy: &StepErrorPolicy) -> Duration {
        Duration::from_millis(policy.retry_delay_ms)
    }
}
