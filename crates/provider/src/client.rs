use async_trait::async_trait;
use outpost_core::EmailMessage;

use crate::error::ProviderError;
use crate::operation::{OperationHandle, OperationStatus, WaitPolicy};
use crate::request::{ProviderRequest, build_json_request};

/// Strongly-typed email client trait with native `async fn`.
///
/// A client adapts the generic [`EmailMessage`] to one provider and performs
/// the network calls. The send is asynchronous on the provider side:
/// [`submit`](Self::submit) returns an [`OperationHandle`] and
/// [`poll_status`](Self::poll_status) refreshes it until it is terminal.
///
/// This trait is **not** object-safe. Implement it and rely on the blanket
/// [`DynEmailClient`] implementation for dynamic dispatch.
pub trait EmailClient: Send + Sync {
    /// Returns the name of this client, used in logs.
    fn name(&self) -> &str;

    /// Render a message into the provider's request shape.
    ///
    /// Defaults to [`build_json_request`].
    fn build_request(
        &self,
        message: &EmailMessage,
    ) -> impl std::future::Future<Output = Result<ProviderRequest, ProviderError>> + Send {
        build_json_request(message)
    }

    /// Submit a rendered request.
    fn submit(
        &self,
        request: &ProviderRequest,
        wait: WaitPolicy,
    ) -> impl std::future::Future<Output = Result<OperationHandle, ProviderError>> + Send;

    /// Fetch the current status of a submitted operation.
    fn poll_status(
        &self,
        handle: &OperationHandle,
    ) -> impl std::future::Future<Output = Result<OperationStatus, ProviderError>> + Send;
}

/// Object-safe email client trait for use behind `Arc<dyn DynEmailClient>`.
///
/// You generally should not implement this trait directly; implement
/// [`EmailClient`] instead.
#[async_trait]
pub trait DynEmailClient: Send + Sync {
    /// Returns the name of this client.
    fn name(&self) -> &str;

    /// Render a message into the provider's request shape.
    async fn build_request(&self, message: &EmailMessage) -> Result<ProviderRequest, ProviderError> {
        build_json_request(message).await
    }

    /// Submit a rendered request.
    async fn submit(
        &self,
        request: &ProviderRequest,
        wait: WaitPolicy,
    ) -> Result<OperationHandle, ProviderError>;

    /// Fetch the current status of a submitted operation.
    async fn poll_status(&self, handle: &OperationHandle) -> Result<OperationStatus, ProviderError>;
}

/// Blanket implementation: any [`EmailClient`] is also a [`DynEmailClient`].
#[async_trait]
impl<T: EmailClient + Sync> DynEmailClient for T {
    fn name(&self) -> &str {
        EmailClient::name(self)
    }

    async fn build_request(&self, message: &EmailMessage) -> Result<ProviderRequest, ProviderError> {
        EmailClient::build_request(self, message).await
    }

    async fn submit(
        &self,
        request: &ProviderRequest,
        wait: WaitPolicy,
    ) -> Result<OperationHandle, ProviderError> {
        EmailClient::submit(self, request, wait).await
    }

    async fn poll_status(&self, handle: &OperationHandle) -> Result<OperationStatus, ProviderError> {
        EmailClient::poll_status(self, handle).await
    }
}
