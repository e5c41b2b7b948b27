//! Retry policy for failed action steps

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::RetrySettings;

/// Maximum retries when a step opts in without a count
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Outcome of a retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run the step again after the delay
    RetryAfter(Duration),
    /// Retries are disabled or exhausted; the execution fails
    GiveUp,
}

/// Exponential backoff policy for one step
///
/// The delay before retry `n` (1-based) is `base_unit * 2^n`, capped at
/// `max_interval`: with the default one-second unit the retries run after
/// 2s, 4s and 8s.
///
/// # Example
///
/// ```
/// use creatorflow_engine::reliability::{RetryDecision, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(3, Duration::from_secs(1));
///
/// assert_eq!(policy.decide(1), RetryDecision::RetryAfter(Duration::from_secs(2)));
/// assert_eq!(policy.decide(3), RetryDecision::RetryAfter(Duration::from_secs(8)));
/// assert_eq!(policy.decide(4), RetryDecision::GiveUp);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt
    pub max_retries: u32,

    /// Backoff unit multiplied by `2^attempt`
    #[serde(with = "duration_millis")]
    pub base_unit: Duration,

    /// Upper bound for any single delay
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_unit: Duration::ZERO,
            max_interval: Duration::ZERO,
        }
    }

    /// Exponential backoff with the given retry budget
    pub fn exponential(max_retries: u32, base_unit: Duration) -> Self {
        Self {
            max_retries,
            base_unit,
            max_interval: Duration::from_secs(3600),
        }
    }

    /// Build the policy for a step from its opt-in settings
    ///
    /// Retries are enabled only when the step sets `retry_on_failure`;
    /// `default_max_retries` applies when it gives no count.
    pub fn for_step(settings: &RetrySettings, default_max_retries: u32, base_unit: Duration) -> Self {
        if !settings.retry_on_failure {
            return Self::no_retry();
        }
        Self::exponential(
            settings.retry_count.unwrap_or(default_max_retries),
            base_unit,
        )
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_unit
            .checked_mul(factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }

    /// Decide what happens after failed attempt number `attempt` (1-based)
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt == 0 || attempt > self.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for_attempt(attempt))
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opted_in(count: Option<u32>) -> RetrySettings {
        RetrySettings {
            retry_on_failure: true,
            retry_count: count,
        }
    }

    #[test]
    fn test_disabled_unless_opted_in() {
        let settings = RetrySettings {
            retry_on_failure: false,
            retry_count: Some(5),
        };
        let policy = RetryPolicy::for_step(&settings, 3, Duration::from_secs(1));
        assert!(!policy.is_enabled());
        assert_eq!(policy.decide(1), RetryDecision::GiveUp);
    }

    #[test]
    fn test_default_max_retries() {
        let policy = RetryPolicy::for_step(&opted_in(None), DEFAULT_MAX_RETRIES, Duration::from_secs(1));
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);

        let policy = RetryPolicy::for_step(&opted_in(Some(1)), DEFAULT_MAX_RETRIES, Duration::from_secs(1));
        assert_eq!(policy.max_retries, 1);
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::exponential(5, Duration::from_secs(1));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(16));
    }

    #[test]
    fn test_gives_up_after_budget() {
        let policy =
            RetryPolicy::for_step(&opted_in(Some(3)), DEFAULT_MAX_RETRIES, Duration::from_millis(10));

        assert!(matches!(policy.decide(1), RetryDecision::RetryAfter(_)));
        assert!(matches!(policy.decide(3), RetryDecision::RetryAfter(_)));
        assert_eq!(policy.decide(4), RetryDecision::GiveUp);
    }

    #[test]
    fn test_max_interval_cap() {
        let policy = RetryPolicy {
            max_interval: Duration::from_secs(30),
            ..RetryPolicy::exponential(64, Duration::from_secs(1))
        };

        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
        // Exponent overflow still lands on the cap
        assert_eq!(policy.delay_for_attempt(63), Duration::from_secs(30));
    }

    #[test]
    fn test_serialization() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(250));

        let json = serde_json::to_string(&policy).unwrap();
        let parsed: RetryPolicy = serde_json::from_str(&json).unwrap();

        assert_eq!(policy, parsed);
    }
}
