use tracing::info;
use uuid::Uuid;

use crate::client::EmailClient;
use crate::error::ProviderError;
use crate::operation::{OperationHandle, OperationStatus, WaitPolicy};
use crate::request::ProviderRequest;

/// A client that logs each request and reports success without performing
/// any external I/O.
///
/// Useful for local development, simulations, and tests that only care about
/// the dispatch pipeline. With [`WaitPolicy::Accepted`] the operation starts
/// out running and completes on the first poll.
pub struct LogEmailClient {
    name: String,
}

impl LogEmailClient {
    /// Create a new `LogEmailClient` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EmailClient for LogEmailClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::unused_async)]
    async fn submit(
        &self,
        request: &ProviderRequest,
        wait: WaitPolicy,
    ) -> Result<OperationHandle, ProviderError> {
        let id = Uuid::now_v7().to_string();
        info!(
            client = %self.name,
            operation_id = %id,
            recipients = request.recipient_count,
            subject = %request.body["content"]["subject"],
            ?wait,
            "log client accepted send"
        );
        let status = match wait {
            WaitPolicy::Completed => OperationStatus::succeeded(),
            WaitPolicy::Accepted => OperationStatus::running(),
        };
        Ok(OperationHandle::new(id, status))
    }

    #[allow(clippy::unused_async)]
    async fn poll_status(&self, handle: &OperationHandle) -> Result<OperationStatus, ProviderError> {
        info!(client = %self.name, operation_id = %handle.id, "log client completed send");
        Ok(OperationStatus::succeeded())
    }
}

#[cfg(test)]
mod tests {
    use outpost_core::EmailMessage;

    use super::*;

    fn message() -> EmailMessage {
        EmailMessage::new("hello")
            .with_from("from@example.com")
            .add_to("to@example.com")
            .with_text_body("body")
    }

    #[test]
    fn log_client_name() {
        let client = LogEmailClient::new("test-log");
        assert_eq!(EmailClient::name(&client), "test-log");
    }

    #[tokio::test]
    async fn completed_submit_is_terminal() {
        let client = LogEmailClient::new("log");
        let request = client.build_request(&message()).await.unwrap();
        let handle = client.submit(&request, WaitPolicy::Completed).await.unwrap();
        assert!(handle.status.is_success());
        assert!(!handle.id.is_empty());
    }

    #[tokio::test]
    async fn accepted_submit_completes_on_poll() {
        let client = LogEmailClient::new("log");
        let request = client.build_request(&message()).await.unwrap();
        let handle = client.submit(&request, WaitPolicy::Accepted).await.unwrap();
        assert!(!handle.is_terminal());
        let status = client.poll_status(&handle).await.unwrap();
        assert!(status.is_success());
    }
}
