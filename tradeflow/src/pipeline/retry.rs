//! Retry and timeout handling for capability invocations.
//!
//! Every external call (analyst, debate turn, synthesis, trader) goes through
//! [`invoke_with_policy`]. A timeout counts as a failed attempt; once the
//! attempt budget is spent the last error is returned as a
//! [`CapabilityFailure`].

use crate::errors::CapabilityFailure;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^retry
    #[default]
    Exponential,
    /// delay = base * (retry + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(base, prev * 3))
    Decorrelated,
}

/// Retry budget applied to every capability call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff: BackoffStrategy::Exponential,
            jitter: JitterStrategy::Full,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy (one retry).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that retries immediately, without delay.
    #[must_use]
    pub fn immediate() -> Self {
        Self::default()
            .with_base_delay_ms(0)
            .with_jitter(JitterStrategy::None)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }
}

/// Delay bookkeeping for one invocation.
#[derive(Debug, Default)]
struct RetryState {
    /// Retries performed so far.
    retries: u32,
    /// Previous delay for decorrelated jitter.
    previous_delay: Option<u64>,
}

impl RetryState {
    fn next_delay(&mut self, policy: &RetryPolicy) -> Duration {
        let base = policy.base_delay_ms;
        let max = policy.max_delay_ms;

        let delay = match policy.backoff {
            BackoffStrategy::Exponential => base
                .saturating_mul(2u64.saturating_pow(self.retries))
                .min(max),
            BackoffStrategy::Linear => base
                .saturating_mul(u64::from(self.retries) + 1)
                .min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match policy.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let prev = self.previous_delay.unwrap_or(base);
                let upper = prev.saturating_mul(3).min(max);
                let next = if upper <= base {
                    base
                } else {
                    rand::thread_rng().gen_range(base..=upper)
                };
                self.previous_delay = Some(next);
                next
            }
        };

        self.retries += 1;
        Duration::from_millis(jittered)
    }
}

/// Runs `operation` under the timeout and retry policy.
///
/// Each attempt is invoked with identical inputs; the closure is expected to
/// rebuild its future from the same captured context.
pub async fn invoke_with_policy<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    mut operation: F,
) -> Result<T, CapabilityFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut state = RetryState::default();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let failure = match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => CapabilityFailure::new(label, attempt, format!("{e:#}")),
            Err(_) => CapabilityFailure::new(
                label,
                attempt,
                format!("timed out after {}ms", timeout.as_millis()),
            )
            .timed_out(),
        };

        if attempt >= max_attempts {
            tracing::warn!(
                capability = %label,
                attempts = attempt,
                reason = %failure.reason,
                "Capability failed, retry budget exhausted"
            );
            return Err(failure);
        }

        let delay = state.next_delay(policy);
        tracing::debug!(
            capability = %label,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            reason = %failure.reason,
            "Retrying capability after failure"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.backoff, BackoffStrategy::Exponential);
        assert_eq!(policy.jitter, JitterStrategy::Full);
    }

    #[test]
    fn test_retry_policy_partial_json() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 250);
    }

    #[test]
    fn test_delay_exponential_no_jitter() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::None);
        let mut state = RetryState::default();

        assert_eq!(state.next_delay(&policy), Duration::from_millis(100));
        assert_eq!(state.next_delay(&policy), Duration::from_millis(200));
        assert_eq!(state.next_delay(&policy), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_linear_and_capped() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(1_000)
            .with_max_delay_ms(1_500)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);
        let mut state = RetryState::default();

        assert_eq!(state.next_delay(&policy), Duration::from_millis(1_000));
        assert_eq!(state.next_delay(&policy), Duration::from_millis(1_500));
    }

    #[test]
    fn test_delay_full_jitter_bounded() {
        let policy = RetryPolicy::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant);
        let mut state = RetryState::default();

        for _ in 0..10 {
            assert!(state.next_delay(&policy) <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = invoke_with_policy("test", &RetryPolicy::immediate(), Duration::from_secs(1), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retried_once_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = invoke_with_policy("test", &RetryPolicy::immediate(), Duration::from_secs(1), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("transient")
                }
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<(), _> =
            invoke_with_policy("analyst:news", &RetryPolicy::immediate(), Duration::from_secs(1), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("always fails")
                }
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.capability, "analyst:news");
        assert!(failure.reason.contains("always fails"));
        assert!(!failure.timed_out);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let result: Result<(), _> = invoke_with_policy(
            "slow",
            &RetryPolicy::immediate().with_max_attempts(1),
            Duration::from_millis(10),
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        let failure = result.unwrap_err();
        assert!(failure.timed_out);
        assert!(failure.reason.contains("timed out"));
    }
}
