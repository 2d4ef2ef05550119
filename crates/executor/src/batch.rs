use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use outpost_core::{BulkResponse, EmailMessage, SendResult};

use crate::collector::ResultCollector;
use crate::error::{Cancelled, DispatchError};
use crate::executor::{EmailSender, panic_message, recipient_label};
use crate::poller::PollPolicy;

impl EmailSender {
    /// Send many independent messages concurrently.
    ///
    /// Every message is its own unit on the runtime. Units apply the sender
    /// defaults and validate without limit, then queue for one of
    /// [`BulkSettings::max_concurrency`](crate::BulkSettings::max_concurrency)
    /// permits before submitting and polling. A unit that fails or panics
    /// yields a failed result for its primary recipient and never affects its
    /// siblings.
    ///
    /// Results arrive in completion order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use outpost_core::EmailMessage;
    /// # use outpost_executor::{BulkSettings, EmailSender, SendSettings};
    /// # use outpost_provider::LogEmailClient;
    /// # use tokio_util::sync::CancellationToken;
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let sender = EmailSender::new(
    ///     Arc::new(LogEmailClient::new("log")),
    ///     SendSettings::default().with_default_sender("noreply@example.com"),
    ///     BulkSettings::default(),
    /// )
    /// .unwrap();
    /// let messages = vec![
    ///     EmailMessage::new("a").add_to("a@example.com").with_text_body("hi"),
    ///     EmailMessage::new("b").add_to("b@example.com").with_text_body("hi"),
    /// ];
    /// let response = sender
    ///     .send_bulk_personalized(messages, true, &CancellationToken::new())
    ///     .await
    ///     .unwrap();
    /// assert_eq!(response.sent, 2);
    /// # }
    /// ```
    #[instrument(skip(self, messages, cancel), fields(messages = messages.len()))]
    pub async fn send_bulk_personalized(
        &self,
        messages: Vec<EmailMessage>,
        validate_only: bool,
        cancel: &CancellationToken,
    ) -> Result<BulkResponse, DispatchError> {
        if messages.is_empty() {
            return Err(DispatchError::EmptyMessages);
        }

        let total = messages.len();
        let gate = Arc::new(Semaphore::new(self.inner.bulk.max_concurrency));
        let collector = Arc::new(ResultCollector::with_capacity(total));
        let policy = PollPolicy::for_bulk(&self.inner.settings, &self.inner.bulk);

        let mut units = JoinSet::new();
        let mut owners = HashMap::with_capacity(total);
        for message in messages {
            let recipient = recipient_label(&message);
            let sender = self.clone();
            let gate = Arc::clone(&gate);
            let collector = Arc::clone(&collector);
            let cancel = cancel.clone();
            let unit = units.spawn(async move {
                let result = sender
                    .run_unit(message, validate_only, gate, &policy, &cancel)
                    .await?;
                collector.push(result);
                Ok::<(), Cancelled>(())
            });
            owners.insert(unit.id(), recipient);
        }

        let mut cancelled = 0usize;
        while let Some(joined) = units.join_next_with_id().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((_, Err(Cancelled))) => cancelled += 1,
                Err(join_error) => {
                    let recipient = owners.remove(&join_error.id()).unwrap_or_default();
                    let reason = if join_error.is_panic() {
                        panic_message(join_error.into_panic().as_ref())
                    } else {
                        join_error.to_string()
                    };
                    error!(recipient = %recipient, reason = %reason, "bulk unit faulted");
                    collector.push(SendResult::failed(recipient, reason));
                }
            }
        }

        if cancelled > 0 {
            info!(
                cancelled,
                completed = collector.len(),
                "personalized bulk send cancelled"
            );
            return Err(DispatchError::Cancelled {
                completed: collector.take_results(),
            });
        }

        let response = match Arc::try_unwrap(collector) {
            Ok(collector) => collector.into_response(),
            Err(shared) => BulkResponse::from_results(shared.take_results()),
        };
        info!(
            sent = response.sent,
            failed = response.failed,
            "personalized bulk send finished"
        );
        Ok(response)
    }

    async fn run_unit(
        &self,
        mut message: EmailMessage,
        validate_only: bool,
        gate: Arc<Semaphore>,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<SendResult, Cancelled> {
        self.prepare(&mut message);
        if let Some(rejected) = Self::reject_invalid(&message) {
            return Ok(rejected);
        }
        if validate_only {
            return Ok(SendResult::validated(recipient_label(&message)));
        }

        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Cancelled),
            permit = gate.acquire_owned() => permit.map_err(|_| Cancelled)?,
        };
        self.dispatch_guarded(&message, policy, cancel).await
    }
}
