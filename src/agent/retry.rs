//! Bounded retry with exponential backoff.
//!
//! Every call to the generation service goes through [`RetryExecutor`].
//! The delay before attempt `k` (1-indexed, `k > 1`) is
//! `base_delay * 2^(k-2)`, so three attempts with a 2s base sleep 2s then 4s.
//! Errors that cannot succeed on a second try (validation, configuration)
//! end the loop immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::config::AgentConfig;
use crate::error::AgentError;

/// Attempt budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one. Never below 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` of 0 is treated as 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy from the engine configuration.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.max_attempts, config.retry_base_delay)
    }

    /// Delay to wait before `attempt` (1-indexed). Zero for the first attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Result of a retried call.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The call succeeded.
    Success {
        /// Returned value.
        value: T,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed, or the error was not retryable.
    Failure {
        /// Error of the last attempt.
        error: AgentError,
        /// Attempts used.
        attempts: u32,
    },
}

impl<T> RetryOutcome<T> {
    /// Number of attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }

    /// Returns `true` for [`RetryOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Converts into a `Result`, propagating the last original error.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error on failure.
    pub fn into_result(self) -> Result<T, AgentError> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

/// Runs async calls under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Creates an executor with the given policy.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `call` until it succeeds, fails terminally or the budget runs out.
    ///
    /// `call` receives the 1-indexed attempt number. Each failed attempt is
    /// logged with the computed delay before sleeping.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut call: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;
        loop {
            match call(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = label, attempt, "succeeded after retry");
                    }
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    let error_kind = error.kind().as_str();
                    if !error.is_retryable() || attempt >= max_attempts {
                        warn!(
                            operation = label,
                            attempt,
                            max_attempts,
                            error_kind,
                            error = %error,
                            "giving up"
                        );
                        return RetryOutcome::Failure {
                            error,
                            attempts: attempt,
                        };
                    }

                    let delay = self.policy.delay_before(attempt + 1);
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error_kind,
                        error = %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
