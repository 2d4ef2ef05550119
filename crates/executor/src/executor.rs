use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use outpost_core::{EmailMessage, SendResult, validate_message};
use outpost_provider::{DynEmailClient, ProviderError, WaitPolicy};

use crate::config::{BulkSettings, ConfigError, DispatchConfig, SendSettings};
use crate::error::{Cancelled, DispatchError, StepError};
use crate::poller::{PollPhase, PollPolicy, PolledOperation, poll_operation};
use crate::retry::{BackoffPolicy, with_retry};

/// Sends email through a [`DynEmailClient`] with validation, retry, polling
/// and bounded fan-out.
///
/// Every send runs the same pipeline: apply the sender defaults, validate,
/// render the provider request, submit under the retry driver, poll, and map
/// the final operation state to a [`SendResult`]. Per-message problems never
/// surface as errors; they come back as failed results carrying the provider
/// status code and `Retry-After` hint.
///
/// The sender is cheap to clone and safe to share between tasks. Settings are
/// fixed at construction.
#[derive(Clone)]
pub struct EmailSender {
    pub(crate) inner: Arc<SenderInner>,
}

#[derive(Clone)]
pub(crate) struct SenderInner {
    pub(crate) client: Arc<dyn DynEmailClient>,
    pub(crate) settings: SendSettings,
    pub(crate) bulk: BulkSettings,
    pub(crate) backoff: BackoffPolicy,
}

impl EmailSender {
    /// Create a sender after validating both settings objects.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use outpost_executor::{BulkSettings, EmailSender, SendSettings};
    /// use outpost_provider::LogEmailClient;
    ///
    /// let sender = EmailSender::new(
    ///     Arc::new(LogEmailClient::new("log")),
    ///     SendSettings::default().with_default_sender("noreply@example.com"),
    ///     BulkSettings::default(),
    /// )
    /// .unwrap();
    /// assert_eq!(sender.client_name(), "log");
    /// ```
    pub fn new(
        client: Arc<dyn DynEmailClient>,
        settings: SendSettings,
        bulk: BulkSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        bulk.validate()?;
        Ok(Self {
            inner: Arc::new(SenderInner {
                client,
                settings,
                bulk,
                backoff: BackoffPolicy::default(),
            }),
        })
    }

    /// Create a sender from file configuration.
    pub fn from_config(
        client: Arc<dyn DynEmailClient>,
        config: DispatchConfig,
    ) -> Result<Self, ConfigError> {
        let (settings, bulk) = config.into_settings()?;
        Self::new(client, settings, bulk)
    }

    /// Replace the retry backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        Arc::make_mut(&mut self.inner).backoff = backoff;
        self
    }

    /// Name of the underlying client.
    pub fn client_name(&self) -> &str {
        self.inner.client.name()
    }

    /// Settings applied to every send.
    pub fn settings(&self) -> &SendSettings {
        &self.inner.settings
    }

    /// Settings applied to bulk sends.
    pub fn bulk_settings(&self) -> &BulkSettings {
        &self.inner.bulk
    }

    /// Send one message.
    ///
    /// Returns `Err` only when `cancel` fires before the send finishes.
    /// Validation failures, provider rejections, exhausted retries, poll
    /// timeouts and client panics are all reported through the returned
    /// [`SendResult`].
    #[instrument(
        skip(self, message, cancel),
        fields(recipients = message.recipient_count(), client = %self.client_name())
    )]
    pub async fn send(
        &self,
        mut message: EmailMessage,
        cancel: &CancellationToken,
    ) -> Result<SendResult, DispatchError> {
        self.prepare(&mut message);
        let policy = PollPolicy::for_send(&self.inner.settings);
        self.send_prepared(&message, &policy, cancel)
            .await
            .map_err(|Cancelled| DispatchError::Cancelled {
                completed: Vec::new(),
            })
    }

    /// Apply the sender defaults to a message.
    ///
    /// Missing sender is filled in, default headers are added for keys the
    /// message does not set, and default categories are appended when absent.
    /// Applying it twice is a no-op.
    pub fn prepare(&self, message: &mut EmailMessage) {
        let settings = &self.inner.settings;
        if message.from.is_none() {
            message.from.clone_from(&settings.default_sender);
        }
        for (name, value) in &settings.default_headers {
            message
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        for category in &settings.default_categories {
            if !message.categories.contains(category) {
                message.categories.push(category.clone());
            }
        }
    }

    /// Validate a prepared message, returning the failed result for it if it
    /// breaks any rule.
    pub(crate) fn reject_invalid(message: &EmailMessage) -> Option<SendResult> {
        let errors = validate_message(message, true);
        if errors.is_empty() {
            return None;
        }
        debug!(errors = ?errors, "message failed validation");
        Some(SendResult::invalid(recipient_label(message), errors))
    }

    /// Validate and, if valid, dispatch a prepared message.
    pub(crate) async fn send_prepared(
        &self,
        message: &EmailMessage,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<SendResult, Cancelled> {
        if let Some(rejected) = Self::reject_invalid(message) {
            return Ok(rejected);
        }
        self.dispatch_guarded(message, policy, cancel).await
    }

    /// Run the network half of the pipeline, converting provider errors and
    /// panics into failed results.
    pub(crate) async fn dispatch_guarded(
        &self,
        message: &EmailMessage,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<SendResult, Cancelled> {
        let recipient = recipient_label(message);
        let outcome = AssertUnwindSafe(self.dispatch(message, policy, cancel))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(StepError::Cancelled)) => Err(Cancelled),
            Ok(Err(StepError::Provider(err))) => {
                warn!(recipient = %recipient, error = %err, "send failed");
                Ok(provider_failure(recipient, &err))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(recipient = %recipient, reason = %reason, "send pipeline panicked");
                Ok(SendResult::failed(recipient, reason))
            }
        }
    }

    async fn dispatch(
        &self,
        message: &EmailMessage,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<SendResult, StepError> {
        let client = self.inner.client.as_ref();
        let request = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StepError::Cancelled),
            request = client.build_request(message) => request?,
        };

        let wait = WaitPolicy::for_completion(policy.wait_for_completion);
        let handle = with_retry(
            || client.submit(&request, wait),
            self.inner.settings.max_retries,
            &self.inner.backoff,
            cancel,
        )
        .await?;
        debug!(operation_id = %handle.id, state = ?handle.status.state, "submitted");

        let polled = poll_operation(client, handle, policy, cancel).await?;
        Ok(map_operation(recipient_label(message), polled))
    }
}

/// Address a message's result is reported under: its first `to` recipient.
pub(crate) fn recipient_label(message: &EmailMessage) -> String {
    message
        .primary_recipient()
        .map(|address| address.address.clone())
        .unwrap_or_default()
}

fn map_operation(recipient: String, polled: PolledOperation) -> SendResult {
    let PolledOperation { handle, phase, .. } = polled;
    let status = handle.status;
    let code = Some(status.status_code);
    match phase {
        PollPhase::Submitted => SendResult::accepted(recipient, handle.id).with_status_code(code),
        PollPhase::Succeeded => {
            SendResult::succeeded(recipient, Some(handle.id)).with_status_code(code)
        }
        PollPhase::Failed => {
            let error = status
                .error
                .unwrap_or_else(|| format!("operation failed with status {}", status.status_code));
            SendResult::failed(recipient, error)
                .with_message_id(Some(handle.id))
                .with_status_code(code)
                .with_retry_after(status.retry_after)
        }
        PollPhase::Polling | PollPhase::TimedOut => SendResult::timed_out(
            recipient,
            format!("operation {} did not complete before the timeout", handle.id),
        )
        .with_message_id(Some(handle.id))
        .with_status_code(code)
        .with_retry_after(status.retry_after),
    }
}

fn provider_failure(recipient: String, err: &ProviderError) -> SendResult {
    SendResult::failed(recipient, err.to_string())
        .with_status_code(err.status_code())
        .with_retry_after(err.retry_after())
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "send pipeline panicked".to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unnecessary_literal_bound)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use outpost_core::DeliveryState;
    use outpost_core::validate::{BODY_REQUIRED, SENDER_REQUIRED};
    use outpost_provider::{
        EmailClient, OperationHandle, OperationStatus, ProviderRequest, WaitPolicy,
    };
    use parking_lot::Mutex;

    use super::*;

    type SubmitFn = fn(u32, WaitPolicy) -> Result<OperationHandle, ProviderError>;

    struct MockClient {
        on_submit: SubmitFn,
        poll: OperationStatus,
        submits: AtomicU32,
        last_body: Mutex<Option<serde_json::Value>>,
    }

    impl MockClient {
        fn new(on_submit: SubmitFn) -> Arc<Self> {
            Self::with_poll(on_submit, OperationStatus::succeeded())
        }

        fn with_poll(on_submit: SubmitFn, poll: OperationStatus) -> Arc<Self> {
            Arc::new(Self {
                on_submit,
                poll,
                submits: AtomicU32::new(0),
                last_body: Mutex::new(None),
            })
        }

        fn submits(&self) -> u32 {
            self.submits.load(Ordering::SeqCst)
        }
    }

    impl EmailClient for MockClient {
        fn name(&self) -> &str {
            "mock"
        }

        async fn submit(
            &self,
            request: &ProviderRequest,
            wait: WaitPolicy,
        ) -> Result<OperationHandle, ProviderError> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            *self.last_body.lock() = Some(request.body.clone());
            (self.on_submit)(n, wait)
        }

        async fn poll_status(
            &self,
            _handle: &OperationHandle,
        ) -> Result<OperationStatus, ProviderError> {
            Ok(self.poll.clone())
        }
    }

    fn running(_: u32, _: WaitPolicy) -> Result<OperationHandle, ProviderError> {
        Ok(OperationHandle::new("op-1", OperationStatus::running()))
    }

    fn sender(client: Arc<MockClient>, settings: SendSettings) -> EmailSender {
        EmailSender::new(client, settings, BulkSettings::default()).unwrap()
    }

    fn message() -> EmailMessage {
        EmailMessage::new("Welcome")
            .with_from("team@example.com")
            .add_to("user@example.com")
            .with_text_body("hello")
    }

    #[tokio::test(start_paused = true)]
    async fn default_sender_fills_missing_from() {
        let client = MockClient::new(running);
        let sender = sender(
            Arc::clone(&client),
            SendSettings::default().with_default_sender("noreply@example.com"),
        );
        let mut message = message();
        message.from = None;

        let result = sender.send(message, &CancellationToken::new()).await.unwrap();
        assert!(result.success, "{result:?}");
        assert!(result.validation_errors.is_empty());
        assert_eq!(result.state, DeliveryState::Succeeded);
        assert_eq!(result.message_id.as_deref(), Some("op-1"));
        let body = client.last_body.lock().clone().unwrap();
        assert_eq!(body["senderAddress"], "noreply@example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_message_never_reaches_client() {
        let client = MockClient::new(running);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let mut message = message();
        message.text_body = None;

        let result = sender.send(message, &CancellationToken::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.state, DeliveryState::Invalid);
        assert_eq!(result.recipient, "user@example.com");
        assert!(result.validation_errors.iter().any(|e| e == BODY_REQUIRED));
        assert_eq!(client.submits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_sender_without_default_is_invalid() {
        let client = MockClient::new(running);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let mut message = message();
        message.from = None;

        let result = sender.send(message, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.state, DeliveryState::Invalid);
        assert_eq!(result.validation_errors, [SENDER_REQUIRED]);
        assert_eq!(client.submits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_and_forget_is_accepted() {
        let client = MockClient::new(running);
        let sender = sender(
            Arc::clone(&client),
            SendSettings::default().with_wait_for_completion(false),
        );
        let result = sender.send(message(), &CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.state, DeliveryState::Accepted);
        assert_eq!(result.status_code, Some(202));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_policy_follows_settings() {
        fn check(_: u32, wait: WaitPolicy) -> Result<OperationHandle, ProviderError> {
            assert_eq!(wait, WaitPolicy::Completed);
            Ok(OperationHandle::new("op-1", OperationStatus::succeeded()))
        }
        let client = MockClient::new(check);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let result = sender.send(message(), &CancellationToken::new()).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_keeps_status_and_hint() {
        fn rejected(_: u32, _: WaitPolicy) -> Result<OperationHandle, ProviderError> {
            Ok(OperationHandle::new(
                "op-7",
                OperationStatus::failed(422, "mailbox unavailable")
                    .with_retry_after(Duration::from_secs(9)),
            ))
        }
        let client = MockClient::new(rejected);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let result = sender.send(message(), &CancellationToken::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.state, DeliveryState::Failed);
        assert_eq!(result.status_code, Some(422));
        assert_eq!(result.retry_after, Some(Duration::from_secs(9)));
        assert_eq!(result.error.as_deref(), Some("mailbox unavailable"));
        assert_eq!(client.submits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_retried_then_reported() {
        fn broken(_: u32, _: WaitPolicy) -> Result<OperationHandle, ProviderError> {
            Err(ProviderError::Status {
                code: 500,
                message: "internal".into(),
                retry_after: None,
            })
        }
        let client = MockClient::new(broken);
        let sender = sender(
            Arc::clone(&client),
            SendSettings::default().with_max_retries(2),
        );
        let result = sender.send(message(), &CancellationToken::new()).await.unwrap();
        assert_eq!(client.submits(), 3);
        assert!(!result.success);
        assert_eq!(result.status_code, Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_without_status_not_retried() {
        fn offline(_: u32, _: WaitPolicy) -> Result<OperationHandle, ProviderError> {
            Err(ProviderError::Connection("refused".into()))
        }
        let client = MockClient::new(offline);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let result = sender.send(message(), &CancellationToken::new()).await.unwrap();
        assert_eq!(client.submits(), 1);
        assert_eq!(result.state, DeliveryState::Failed);
        assert_eq!(result.status_code, None);
        assert!(result.error.unwrap().contains("refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_timeout_is_distinct_from_failure() {
        let client = MockClient::with_poll(running, OperationStatus::running());
        let sender = sender(
            Arc::clone(&client),
            SendSettings::default()
                .with_operation_timeout(Duration::from_secs(5))
                .with_polling_interval(Duration::from_secs(1)),
        );
        let result = sender.send(message(), &CancellationToken::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.state, DeliveryState::TimedOut);
        assert_eq!(result.message_id.as_deref(), Some("op-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn client_panic_becomes_failed_result() {
        fn explode(_: u32, _: WaitPolicy) -> Result<OperationHandle, ProviderError> {
            panic!("adapter bug")
        }
        let client = MockClient::new(explode);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let result = sender.send(message(), &CancellationToken::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("adapter bug"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_send_is_an_error() {
        let client = MockClient::new(running);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = sender.send(message(), &cancel).await.unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled { completed } if completed.is_empty()));
        assert_eq!(client.submits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_validation_still_completes() {
        let client = MockClient::new(running);
        let sender = sender(Arc::clone(&client), SendSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut message = message();
        message.to.clear();
        let result = sender.send(message, &cancel).await.unwrap();
        assert_eq!(result.state, DeliveryState::Invalid);
    }

    #[test]
    fn prepare_is_idempotent() {
        let sender = sender(
            MockClient::new(running),
            SendSettings::default()
                .with_default_header("X-Campaign", "spring")
                .with_default_category("newsletter"),
        );
        let mut message = message().with_header("X-Campaign", "custom");
        sender.prepare(&mut message);
        sender.prepare(&mut message);
        assert_eq!(message.headers["X-Campaign"], "custom");
        assert_eq!(message.categories, ["newsletter"]);
        assert_eq!(message.from.unwrap().address, "team@example.com");
    }

    #[test]
    fn new_rejects_out_of_range_settings() {
        let result = EmailSender::new(
            MockClient::new(running),
            SendSettings::default().with_max_retries(11),
            BulkSettings::default(),
        );
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));

        let result = EmailSender::new(
            MockClient::new(running),
            SendSettings::default(),
            BulkSettings::default().with_max_chunk_size(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn from_config_applies_file_settings() {
        let config = DispatchConfig::from_toml_str(
            "default_sender = \"ops@example.com\"\nmax_retries = 1\n[bulk]\nmax_concurrency = 4\n",
        )
        .unwrap();
        let sender = EmailSender::from_config(MockClient::new(running), config).unwrap();
        assert_eq!(sender.settings().max_retries, 1);
        assert_eq!(sender.bulk_settings().max_concurrency, 4);
        assert_eq!(
            sender.settings().default_sender.as_ref().unwrap().address,
            "ops@example.com"
        );
    }
}
