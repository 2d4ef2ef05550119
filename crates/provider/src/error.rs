use std::time::Duration;

use thiserror::Error;

/// Errors raised by an email client while building, submitting or polling a
/// send operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with an error status.
    #[error("provider returned status {code}: {message}")]
    Status {
        /// HTTP-style status code.
        code: u16,
        /// Provider error description.
        message: String,
        /// Back-off hint from a `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// The provider rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited {
        /// Back-off hint from a `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// A network or transport-level error occurred before any status was
    /// received.
    #[error("connection error: {0}")]
    Connection(String),

    /// The provider failed to process the request for a reason that carries
    /// no status code.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The message could not be rendered into a provider request.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The client was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Status code associated with the error, if the provider sent one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// The provider's back-off hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } | Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns `true` if the error is transient and the submission may
    /// succeed on retry: status 429 or any 5xx. Errors without a status are
    /// terminal.
    pub fn is_retryable(&self) -> bool {
        self.status_code().is_some_and(is_retryable_status)
    }
}

/// Whether a provider status code is worth retrying (429 or server error).
///
/// # Examples
///
/// ```
/// use outpost_provider::is_retryable_status;
///
/// assert!(is_retryable_status(429));
/// assert!(is_retryable_status(503));
/// assert!(!is_retryable_status(400));
/// ```
pub fn is_retryable_status(code: u16) -> bool {
    code == 429 || code >= 500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(
            ProviderError::Status {
                code: 500,
                message: "boom".into(),
                retry_after: None
            }
            .is_retryable()
        );
        assert!(
            ProviderError::Status {
                code: 503,
                message: "unavailable".into(),
                retry_after: Some(Duration::from_secs(2))
            }
            .is_retryable()
        );
    }

    #[test]
    fn non_retryable_errors() {
        assert!(
            !ProviderError::Status {
                code: 400,
                message: "bad request".into(),
                retry_after: None
            }
            .is_retryable()
        );
        assert!(!ProviderError::Connection("reset".into()).is_retryable());
        assert!(!ProviderError::ExecutionFailed("x".into()).is_retryable());
        assert!(!ProviderError::Serialization("x".into()).is_retryable());
        assert!(!ProviderError::Configuration("x".into()).is_retryable());
    }

    #[test]
    fn rate_limited_reports_429_and_hint() {
        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn error_display() {
        let err = ProviderError::Status {
            code: 502,
            message: "bad gateway".into(),
            retry_after: None,
        };
        assert_eq!(err.to_string(), "provider returned status 502: bad gateway");
        assert_eq!(
            ProviderError::RateLimited { retry_after: None }.to_string(),
            "rate limited"
        );
    }
}
