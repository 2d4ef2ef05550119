use outpost_core::SendResult;
use outpost_provider::ProviderError;
use thiserror::Error;

/// Call-level failures of a dispatch.
///
/// Per-message problems (validation, provider rejections, timeouts) are never
/// reported here; they come back as failed [`SendResult`]s.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A broadcast was requested with no recipients.
    #[error("recipient list must not be empty")]
    EmptyRecipients,

    /// A personalized bulk send was requested with no messages.
    #[error("message list must not be empty")]
    EmptyMessages,

    /// The caller cancelled the dispatch. Units that had already finished
    /// keep their results.
    #[error("dispatch cancelled after {} completed results", completed.len())]
    Cancelled {
        /// Results of units that completed before cancellation.
        completed: Vec<SendResult>,
    },
}

/// Why a single pipeline step stopped early.
#[derive(Debug, Error)]
pub enum StepError {
    /// The cancellation token fired during a suspension point.
    #[error("cancelled")]
    Cancelled,

    /// The email client failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A unit of work stopped because the dispatch was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancelled")]
pub struct Cancelled;
