use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::is_retryable_status;

/// How long `submit` should wait before handing back an operation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Return as soon as the provider has accepted the send.
    Accepted,
    /// Block until the operation is terminal. Clients may still return early
    /// with a non-terminal handle; the caller polls the rest of the way.
    Completed,
}

impl WaitPolicy {
    /// `Completed` when the caller wants confirmation, `Accepted` otherwise.
    pub fn for_completion(wait_for_completion: bool) -> Self {
        if wait_for_completion {
            Self::Completed
        } else {
            Self::Accepted
        }
    }
}

/// Lifecycle state of a provider send operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationState {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// A snapshot of a send operation's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    /// Current lifecycle state.
    pub state: OperationState,
    /// HTTP-style status code of the latest response.
    pub status_code: u16,
    /// Back-off hint from the provider.
    #[serde(default)]
    pub retry_after: Option<Duration>,
    /// Provider error description for failed operations.
    #[serde(default)]
    pub error: Option<String>,
}

impl OperationStatus {
    /// An accepted, still running operation (`202 Accepted`).
    pub fn running() -> Self {
        Self {
            state: OperationState::Running,
            status_code: 202,
            retry_after: None,
            error: None,
        }
    }

    /// A successfully completed operation (`200 OK`).
    pub fn succeeded() -> Self {
        Self {
            state: OperationState::Succeeded,
            status_code: 200,
            retry_after: None,
            error: None,
        }
    }

    /// A terminal failure with the given status code.
    pub fn failed(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            state: OperationState::Failed,
            status_code,
            retry_after: None,
            error: Some(error.into()),
        }
    }

    /// Attach a `Retry-After` hint.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Whether the operation has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the operation reached terminal success.
    pub fn is_success(&self) -> bool {
        self.state == OperationState::Succeeded
    }

    /// A terminal failure whose status code (429 or 5xx) warrants another
    /// submission.
    pub fn is_retryable_failure(&self) -> bool {
        self.is_terminal() && !self.is_success() && is_retryable_status(self.status_code)
    }
}

/// A submitted send operation.
///
/// Handles are created by an [`EmailClient`](crate::EmailClient) and only
/// consumed by the dispatcher, which refreshes [`status`](Self::status)
/// through [`EmailClient::poll_status`](crate::EmailClient::poll_status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    /// Provider operation id; doubles as the message id.
    pub id: String,
    /// Last observed status.
    pub status: OperationStatus,
}

impl OperationHandle {
    /// Create a handle with an initial status.
    pub fn new(id: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            id: id.into(),
            status,
        }
    }

    /// Whether the last observed status is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
