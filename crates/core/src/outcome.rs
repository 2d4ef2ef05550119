use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where a message ended up, as far as the dispatcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// The provider confirmed the send reached a terminal success state.
    Succeeded,
    /// The provider accepted the send; completion was not awaited.
    Accepted,
    /// Validate-only mode: the message passed every check and was not sent.
    Validated,
    /// The message failed validation and was never submitted.
    Invalid,
    /// The provider reported a failure, or the pipeline faulted.
    Failed,
    /// Polling gave up before the operation reached a terminal state. The
    /// send may still succeed later.
    TimedOut,
}

impl DeliveryState {
    /// Whether this state counts toward the `sent` total.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::Accepted | Self::Validated)
    }
}

/// Outcome of sending to one recipient.
///
/// Failures carry everything a caller needs to schedule its own retry: the
/// provider status code and any `Retry-After` hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    /// Recipient address this result belongs to.
    pub recipient: String,
    /// `true` for succeeded, accepted and validated sends.
    pub success: bool,
    /// Finer-grained delivery state.
    pub state: DeliveryState,
    /// Provider-assigned message (operation) id.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Human-readable failure description.
    #[serde(default)]
    pub error: Option<String>,
    /// Every violated validation rule, when the message was rejected locally.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
    /// Final provider status code, when one was observed.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Provider back-off hint.
    #[serde(default)]
    pub retry_after: Option<Duration>,
}

impl SendResult {
    fn new(recipient: impl Into<String>, state: DeliveryState) -> Self {
        Self {
            recipient: recipient.into(),
            success: state.is_success(),
            state,
            message_id: None,
            error: None,
            validation_errors: Vec::new(),
            status_code: None,
            retry_after: None,
        }
    }

    /// A send confirmed by the provider.
    #[must_use]
    pub fn succeeded(recipient: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            message_id,
            ..Self::new(recipient, DeliveryState::Succeeded)
        }
    }

    /// A send the provider accepted without completion being awaited.
    #[must_use]
    pub fn accepted(recipient: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Self::new(recipient, DeliveryState::Accepted)
        }
    }

    /// A validate-only pass.
    #[must_use]
    pub fn validated(recipient: impl Into<String>) -> Self {
        Self::new(recipient, DeliveryState::Validated)
    }

    /// A message rejected by validation before any provider call.
    #[must_use]
    pub fn invalid(recipient: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            error: Some("message failed validation".to_owned()),
            validation_errors: errors,
            ..Self::new(recipient, DeliveryState::Invalid)
        }
    }

    /// A provider failure or pipeline fault.
    #[must_use]
    pub fn failed(recipient: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(recipient, DeliveryState::Failed)
        }
    }

    /// An operation still in flight when polling gave up.
    #[must_use]
    pub fn timed_out(recipient: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(recipient, DeliveryState::TimedOut)
        }
    }

    /// Attach a provider message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: Option<String>) -> Self {
        self.message_id = message_id;
        self
    }

    /// Attach the provider status code.
    #[must_use]
    pub fn with_status_code(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    /// Attach the provider back-off hint.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Copy this result for another recipient, keeping every other field.
    ///
    /// A broadcast chunk is one provider call; its outcome is replicated to
    /// each recipient of the chunk this way.
    #[must_use]
    pub fn for_recipient(&self, recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            ..self.clone()
        }
    }
}

/// Aggregate outcome of a bulk send.
///
/// `sent + failed == results.len()` always holds. Result order is only
/// meaningful for broadcasts (chunk order); fan-out results arrive in
/// completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Number of successful results.
    pub sent: usize,
    /// Number of failed results.
    pub failed: usize,
    /// One result per recipient (broadcast) or per message (fan-out).
    pub results: Vec<SendResult>,
}

impl BulkResponse {
    /// Aggregate a list of per-unit results.
    ///
    /// # Examples
    ///
    /// ```
    /// use outpost_core::{BulkResponse, SendResult};
    ///
    /// let response = BulkResponse::from_results(vec![
    ///     SendResult::validated("a@example.com"),
    ///     SendResult::failed("b@example.com", "rejected"),
    /// ]);
    /// assert_eq!((response.sent, response.failed), (1, 1));
    /// ```
    pub fn from_results(results: Vec<SendResult>) -> Self {
        let sent = results.iter().filter(|r| r.success).count();
        Self {
            sent,
            failed: results.len() - sent,
            results,
        }
    }

    /// Total number of results.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Results for a given recipient address.
    pub fn results_for<'a, 'r>(
        &'a self,
        recipient: &'r str,
    ) -> impl Iterator<Item = &'a SendResult> + use<'a, 'r> {
        self.results.iter().filter(move |r| r.recipient == recipient)
    }
}
