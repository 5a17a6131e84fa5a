//! Concurrency bound and inter-call pacing for service calls.
//!
//! A call holds a semaphore permit while it runs and for the pacing delay
//! afterwards, so with one permit consecutive calls are always at least
//! `request_delay` apart. Retry backoff sleeps happen outside the permit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::config::AgentConfig;
use super::retry::{RetryExecutor, RetryOutcome, RetryPolicy};
use crate::error::AgentError;

/// Shared gate in front of the generation service.
#[derive(Debug, Clone)]
pub struct Pacer {
    semaphore: Arc<Semaphore>,
    request_delay: Duration,
}

impl Pacer {
    /// Creates a pacer with `max_concurrency` permits (at least 1).
    #[must_use]
    pub fn new(max_concurrency: usize, request_delay: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            request_delay,
        }
    }

    /// Pacer from the engine configuration.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.max_concurrency, config.request_delay)
    }

    /// Pacing delay applied after each call.
    #[must_use]
    pub const fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Runs one service call under a permit, then sleeps the pacing delay.
    ///
    /// # Errors
    ///
    /// Returns the call's error, or [`AgentError::Orchestration`] if the
    /// semaphore was closed.
    pub async fn run<T, Fut>(&self, call: Fut) -> Result<T, AgentError>
    where
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| AgentError::Orchestration {
                message: format!("semaphore closed: {e}"),
            })?;
        let result = call.await;
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        result
    }
}

/// Retry and pacing combined: the path every service call takes.
///
/// Each attempt runs under the pacer; backoff sleeps between attempts run
/// without holding a permit.
#[derive(Debug, Clone)]
pub struct ServiceGate {
    retry: RetryExecutor,
    pacer: Pacer,
}

impl ServiceGate {
    /// Creates a gate from its parts.
    #[must_use]
    pub const fn new(retry: RetryExecutor, pacer: Pacer) -> Self {
        Self { retry, pacer }
    }

    /// Gate from the engine configuration.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            RetryExecutor::new(RetryPolicy::from_config(config)),
            Pacer::from_config(config),
        )
    }

    /// The retry policy in force.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// Runs `call` with retries, pacing every attempt.
    pub async fn call<T, F, Fut>(&self, label: &str, mut call: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let pacer = &self.pacer;
        self.retry
            .execute(label, move |attempt| pacer.run(call(attempt)))
            .await
    }
}
