use std::future::Future;
use std::ops::Range;
use std::time::Duration;

use outpost_provider::{OperationHandle, ProviderError};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StepError;

/// Exponential backoff with a capped exponent and random jitter.
///
/// The delay before retry `attempt` (zero-based) is
/// `base * 2^min(attempt, max_exponent)` plus a uniform jitter drawn from
/// `jitter`. A provider `Retry-After` hint replaces the computed delay.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay unit multiplied by the exponential factor.
    pub base: Duration,
    /// Largest exponent applied; caps the base delay at `base * 2^max_exponent`.
    /// Delays that overflow saturate at [`Duration::MAX`].
    pub max_exponent: u32,
    /// Range the random jitter is drawn from.
    pub jitter: Range<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_exponent: 6,
            jitter: Duration::from_millis(250)..Duration::from_millis(1000),
        }
    }
}

impl BackoffPolicy {
    /// The jitter-free part of the delay for the given zero-based `attempt`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use outpost_executor::BackoffPolicy;
    ///
    /// let policy = BackoffPolicy::default();
    /// assert_eq!(policy.base_delay(0), Duration::from_secs(1));
    /// assert_eq!(policy.base_delay(3), Duration::from_secs(8));
    /// assert_eq!(policy.base_delay(20), Duration::from_secs(64));
    /// ```
    pub fn base_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt.min(self.max_exponent))
            .map_or(Duration::MAX, |factor| self.base.saturating_mul(factor))
    }

    /// Delay before the retry that follows `attempt`, honouring a provider
    /// `Retry-After` hint when one was given.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint;
        }
        let jitter = if self.jitter.is_empty() {
            self.jitter.start
        } else {
            rand::thread_rng().gen_range(self.jitter.clone())
        };
        self.base_delay(attempt).saturating_add(jitter)
    }
}

/// Sleep for `duration` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), StepError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StepError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Run `attempt` until it yields something other than a retryable failure.
///
/// A retryable failure is either a [`ProviderError`] with status 429 or 5xx,
/// or a handle whose terminal status carries one of those codes. Guarded
/// attempts `0..max_retries` are retried after a [`BackoffPolicy`] delay.
/// Once they are used up, one final attempt runs unguarded and its outcome is
/// returned as-is, so the submission runs at most `max_retries + 1` times.
/// Non-retryable errors return immediately.
pub async fn with_retry<F, Fut>(
    mut attempt: F,
    max_retries: u32,
    backoff: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<OperationHandle, StepError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<OperationHandle, ProviderError>>,
{
    for n in 0..max_retries {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StepError::Cancelled),
            outcome = attempt() => outcome,
        };

        let retry_after = match outcome {
            Ok(handle) if handle.status.is_retryable_failure() => {
                warn!(
                    attempt = n,
                    operation_id = %handle.id,
                    status = handle.status.status_code,
                    "operation failed with retryable status"
                );
                handle.status.retry_after
            }
            Ok(handle) => return Ok(handle),
            Err(err) if err.is_retryable() => {
                warn!(attempt = n, error = %err, "retryable submission error");
                err.retry_after()
            }
            Err(err) => return Err(err.into()),
        };

        let delay = backoff.delay_for(n, retry_after);
        debug!(attempt = n, delay_ms = %delay.as_millis(), "backing off before retry");
        sleep_or_cancel(delay, cancel).await?;
    }

    debug!(attempt = max_retries, "final submission attempt");
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StepError::Cancelled),
        outcome = attempt() => outcome.map_err(StepError::from),
    }
}
