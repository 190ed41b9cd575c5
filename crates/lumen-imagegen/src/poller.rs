use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    error::{ErrorKind, ProviderError, Result},
    provider::cancellable,
    types::TaskHandle,
};

/// Observation from one status check
#[derive(Debug)]
pub enum TaskPoll<T> {
    /// Job still running; keep polling
    Pending,
    /// Job finished; carries the payload to normalize
    Succeeded(T),
    /// Job failed; carries the provider's message when it sent one
    Failed(Option<String>),
}

/// Number of status checks that fit into `timeout` at `interval` spacing
///
/// Always at least one, so a budget shorter than the interval still polls once.
pub fn max_attempts(timeout: Duration, interval: Duration) -> u32 {
    let interval = interval.as_millis().max(1);
    let attempts = timeout.as_millis().div_ceil(interval).max(1);

    u32::try_from(attempts).unwrap_or(u32::MAX)
}

/// Bounded submit-then-poll driver
///
/// Each attempt sleeps for the interval and then runs one status check.
/// Check errors are tolerated until the final attempt; cancellation never is.
#[derive(Debug, Clone, Copy)]
pub struct TaskPoller {
    interval: Duration,
    timeout: Duration,
}

impl TaskPoller {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn max_attempts(&self) -> u32 {
        max_attempts(self.timeout, self.interval)
    }

    /// Poll until the job reaches a terminal state or the budget runs out
    ///
    /// `check` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::TaskFailed`] when the provider reports failure
    /// - [`ErrorKind::Timeout`] when every attempt saw a pending job
    /// - [`ErrorKind::Cancelled`] when `cancel` fires during a sleep or check
    /// - the check's own error when it fails on the final attempt
    pub async fn run<T, F, Fut>(
        &self,
        provider: &str,
        handle: &TaskHandle,
        cancel: &CancellationToken,
        mut check: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<TaskPoll<T>>>,
    {
        let attempts = self.max_attempts();

        for attempt in 1..=attempts {
            cancellable(provider, cancel, tokio::time::sleep(self.interval)).await?;

            match check(attempt).await {
                Ok(TaskPoll::Pending) => {
                    tracing::debug!(provider, task_id = handle.task_id(), attempt, attempts, "task still pending");
                }
                Ok(TaskPoll::Succeeded(payload)) => {
                    tracing::debug!(provider, task_id = handle.task_id(), attempt, "task succeeded");
                    return Ok(payload);
                }
                Ok(TaskPoll::Failed(message)) => {
                    let message = message.filter(|m| !m.trim().is_empty());
                    tracing::warn!(provider, task_id = handle.task_id(), attempt, ?message, "task failed");
                    return Err(ProviderError::new(
                        ErrorKind::TaskFailed,
                        provider,
                        message.unwrap_or_else(|| "Unknown error".to_string()),
                    ));
                }
                Err(e) if e.kind() == ErrorKind::Cancelled || attempt == attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        provider,
                        task_id = handle.task_id(),
                        attempt,
                        error = %e,
                        "task status check failed, retrying"
                    );
                }
            }
        }

        Err(ProviderError::new(
            ErrorKind::Timeout,
            provider,
            format!("task timed out after {} seconds", self.timeout.as_secs_f64()),
        ))
    }
}
