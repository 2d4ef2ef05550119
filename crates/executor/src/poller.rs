use std::time::Duration;

use outpost_provider::{DynEmailClient, OperationHandle, OperationState, OperationStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{BulkSettings, SendSettings};
use crate::error::StepError;
use crate::retry::sleep_or_cancel;

/// How long and how often to poll an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Poll until terminal; otherwise hand back the in-flight handle.
    pub wait_for_completion: bool,
    /// Give up once this much time has passed since the first check.
    pub timeout: Duration,
    /// Sleep between two status queries.
    pub interval: Duration,
}

impl PollPolicy {
    /// Policy for a single send.
    pub fn for_send(settings: &SendSettings) -> Self {
        Self {
            wait_for_completion: settings.wait_for_completion,
            timeout: settings.operation_timeout,
            interval: settings.polling_interval,
        }
    }

    /// Policy for every unit of a bulk send. The interval is shared with
    /// single sends.
    pub fn for_bulk(settings: &SendSettings, bulk: &BulkSettings) -> Self {
        Self {
            wait_for_completion: bulk.wait_for_completion,
            timeout: bulk.operation_timeout,
            interval: settings.polling_interval,
        }
    }
}

/// Phase of a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Submitted and not awaited. Final when the caller does not wait.
    Submitted,
    /// Awaiting a terminal status.
    Polling,
    /// Terminal success.
    Succeeded,
    /// Terminal failure or cancellation on the provider side.
    Failed,
    /// Still in flight when the timeout elapsed.
    TimedOut,
}

impl PollPhase {
    fn observe(status: &OperationStatus) -> Self {
        match status.state {
            OperationState::Succeeded => Self::Succeeded,
            OperationState::Failed | OperationState::Canceled => Self::Failed,
            OperationState::NotStarted | OperationState::Running => Self::Polling,
        }
    }

    /// Whether the poller stops in this phase.
    pub fn is_final(self) -> bool {
        !matches!(self, Self::Polling)
    }
}

/// The handle as last observed together with the phase the poller ended in.
#[derive(Debug, Clone)]
pub struct PolledOperation {
    pub handle: OperationHandle,
    pub phase: PollPhase,
    /// Number of `poll_status` calls made.
    pub polls: u32,
}

/// Drive a submitted operation to a final [`PollPhase`].
///
/// A handle that is already terminal finishes immediately. When the policy
/// does not wait, a non-terminal handle is returned in [`PollPhase::Submitted`].
/// Otherwise the status is refreshed every `interval` until it is terminal or
/// `timeout` has elapsed. Timing out is not an error; the last observed
/// handle is returned in [`PollPhase::TimedOut`].
pub async fn poll_operation(
    client: &dyn DynEmailClient,
    mut handle: OperationHandle,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<PolledOperation, StepError> {
    let started = Instant::now();
    let mut polls = 0;
    let mut phase = match PollPhase::observe(&handle.status) {
        PollPhase::Polling if !policy.wait_for_completion => PollPhase::Submitted,
        observed => observed,
    };

    while phase == PollPhase::Polling {
        if started.elapsed() >= policy.timeout {
            warn!(
                operation_id = %handle.id,
                polls,
                timeout_ms = %policy.timeout.as_millis(),
                "operation still in flight after timeout"
            );
            phase = PollPhase::TimedOut;
            break;
        }

        sleep_or_cancel(policy.interval, cancel).await?;
        let status = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StepError::Cancelled),
            status = client.poll_status(&handle) => status?,
        };
        polls += 1;
        debug!(
            operation_id = %handle.id,
            polls,
            state = ?status.state,
            status = status.status_code,
            "polled operation status"
        );
        phase = PollPhase::observe(&status);
        handle.status = status;
    }

    Ok(PolledOperation {
        handle,
        phase,
        polls,
    })
}
