use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use outpost_core::{
    BulkResponse, EmailAddress, EmailMessage, MAX_RECIPIENTS, SendResult, validate_message,
};

use crate::error::DispatchError;
use crate::executor::EmailSender;
use crate::poller::PollPolicy;
use crate::retry::sleep_or_cancel;

impl EmailSender {
    /// Broadcast one template to many recipients.
    ///
    /// The template is validated once without its own recipients, then the
    /// recipient list is split into chunks of at most
    /// [`BulkSettings::max_chunk_size`](crate::BulkSettings::max_chunk_size).
    /// Every chunk carries the template's `cc` and `bcc`, so those addresses
    /// count against the per-message recipient limit and shrink the chunks.
    /// Chunks are sent in order as one provider call each, separated by
    /// [`BulkSettings::inter_chunk_delay`](crate::BulkSettings::inter_chunk_delay).
    /// Each chunk's outcome is copied to every recipient in it, and a failed
    /// chunk never stops the ones after it.
    ///
    /// With `validate_only`, nothing is sent and every recipient gets a
    /// validated result when the template is valid.
    #[instrument(
        skip(self, template, recipients, cancel),
        fields(recipients = recipients.len())
    )]
    pub async fn send_bulk_shared(
        &self,
        mut template: EmailMessage,
        recipients: Vec<EmailAddress>,
        validate_only: bool,
        cancel: &CancellationToken,
    ) -> Result<BulkResponse, DispatchError> {
        if recipients.is_empty() {
            return Err(DispatchError::EmptyRecipients);
        }

        self.prepare(&mut template);
        let bulk = &self.inner.bulk;
        let mut errors = validate_message(&template, false);
        let reserved = template.cc.len() + template.bcc.len();
        let chunk_size = bulk
            .max_chunk_size
            .min(MAX_RECIPIENTS.saturating_sub(reserved));
        if reserved == MAX_RECIPIENTS {
            errors.push(format!(
                "cc and bcc use all {MAX_RECIPIENTS} recipient slots, none left for 'to'"
            ));
        }
        if !errors.is_empty() {
            debug!(errors = ?errors, "broadcast template failed validation");
            let results = recipients
                .iter()
                .map(|r| SendResult::invalid(r.address.clone(), errors.clone()))
                .collect();
            return Ok(BulkResponse::from_results(results));
        }

        if validate_only {
            let results = recipients
                .iter()
                .map(|r| SendResult::validated(r.address.clone()))
                .collect();
            return Ok(BulkResponse::from_results(results));
        }

        let policy = PollPolicy::for_bulk(&self.inner.settings, bulk);
        let chunks = recipients.chunks(chunk_size);
        let chunk_count = chunks.len();
        let mut results = Vec::with_capacity(recipients.len());

        for (index, chunk) in chunks.enumerate() {
            if index > 0 && sleep_or_cancel(bulk.inter_chunk_delay, cancel).await.is_err() {
                return Err(DispatchError::Cancelled { completed: results });
            }

            debug!(chunk = index, size = chunk.len(), "sending chunk");
            let message = template.clone().with_to(chunk.to_vec());
            let Ok(outcome) = self.send_prepared(&message, &policy, cancel).await else {
                return Err(DispatchError::Cancelled { completed: results });
            };
            results.extend(chunk.iter().map(|r| outcome.for_recipient(r.address.clone())));
        }

        let response = BulkResponse::from_results(results);
        info!(
            chunks = chunk_count,
            sent = response.sent,
            failed = response.failed,
            "broadcast finished"
        );
        Ok(response)
    }
}
