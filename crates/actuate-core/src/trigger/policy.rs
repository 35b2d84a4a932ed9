//! Retry and timeout policy for non-streaming element runs.
//!
//! The decision of whether to try again is a pure function of how many
//! attempts have failed, so it can be tested without a clock. Waiting between
//! attempts goes through a [`Sleeper`].

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Per-attempt bound; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

impl RetryPolicy {
    /// What to do after `failed_attempts` attempts have failed in a row.
    pub fn decide(&self, failed_attempts: u32) -> RetryDecision {
        if failed_attempts > self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                delay: self.retry_delay,
            }
        }
    }

    /// Upper bound on attempts for one element.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Source of the inter-retry delay.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_counts_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            retry_delay: Duration::from_millis(250),
            timeout: None,
        };
        let retry = RetryDecision::Retry {
            delay: Duration::from_millis(250),
        };
        assert_eq!(policy.decide(1), retry);
        assert_eq!(policy.decide(2), retry);
        assert_eq!(policy.decide(3), RetryDecision::GiveUp);
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_no_retries_gives_up_on_first_failure() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(1), RetryDecision::GiveUp);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_advances_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
