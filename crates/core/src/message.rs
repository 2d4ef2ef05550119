use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::address::EmailAddress;
use crate::attachment::Attachment;

/// Delivery priority hint passed to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Low,
    High,
}

impl Priority {
    /// Value of the conventional `X-Priority` header for this priority.
    pub fn x_priority(self) -> &'static str {
        match self {
            Self::High => "1",
            Self::Normal => "3",
            Self::Low => "5",
        }
    }
}

/// A provider-neutral email message.
///
/// Messages are plain values: deriving a variant (a default sender filled in,
/// a broadcast chunk's recipient list) goes through the consuming `with_*`
/// builders on a clone, never through mutation of a message another send may
/// be reading.
///
/// # Examples
///
/// ```
/// use outpost_core::{EmailAddress, EmailMessage};
///
/// let msg = EmailMessage::new("Quarterly report")
///     .with_from("reports@example.com")
///     .add_to("cfo@example.com")
///     .with_text_body("See attached.");
/// assert_eq!(msg.recipient_count(), 1);
/// assert_eq!(msg.primary_recipient(), Some(&EmailAddress::new("cfo@example.com")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    /// Sender. When absent, the sender's configured default is used.
    pub from: Option<EmailAddress>,
    /// Primary recipients.
    pub to: Vec<EmailAddress>,
    /// Carbon-copy recipients.
    pub cc: Vec<EmailAddress>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<EmailAddress>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text_body: Option<String>,
    /// HTML body.
    pub html_body: Option<String>,
    /// Reply-to address.
    pub reply_to: Option<EmailAddress>,
    /// Extra message headers.
    pub headers: HashMap<String, String>,
    /// Category tags used by the provider for reporting.
    pub categories: Vec<String>,
    /// Arbitrary key-value pairs echoed back in provider events.
    pub custom_args: HashMap<String, String>,
    /// File attachments.
    pub attachments: Vec<Attachment>,
    /// Delivery priority.
    pub priority: Priority,
}

impl EmailMessage {
    /// Create an empty message with the given subject.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Set the sender.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<EmailAddress>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Replace the primary recipient list.
    #[must_use]
    pub fn with_to(mut self, to: Vec<EmailAddress>) -> Self {
        self.to = to;
        self
    }

    /// Append a primary recipient.
    #[must_use]
    pub fn add_to(mut self, to: impl Into<EmailAddress>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Append a carbon-copy recipient.
    #[must_use]
    pub fn add_cc(mut self, cc: impl Into<EmailAddress>) -> Self {
        self.cc.push(cc.into());
        self
    }

    /// Append a blind carbon-copy recipient.
    #[must_use]
    pub fn add_bcc(mut self, bcc: impl Into<EmailAddress>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    /// Set the plain-text body.
    #[must_use]
    pub fn with_text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Set the HTML body.
    #[must_use]
    pub fn with_html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Set the reply-to address.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<EmailAddress>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Add or replace a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Append a category tag.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Add or replace a custom argument.
    #[must_use]
    pub fn with_custom_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_args.insert(key.into(), value.into());
        self
    }

    /// Append an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Set the delivery priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Combined number of `to`, `cc` and `bcc` recipients.
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Every recipient, `to` first, then `cc`, then `bcc`.
    pub fn recipients(&self) -> impl Iterator<Item = &EmailAddress> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    /// The first primary recipient, used to label per-message results.
    pub fn primary_recipient(&self) -> Option<&EmailAddress> {
        self.to.first()
    }

    /// Whether at least one of the two bodies has content.
    pub fn has_body(&self) -> bool {
        let non_empty = |body: &Option<String>| body.as_deref().is_some_and(|b| !b.trim().is_empty());
        non_empty(&self.text_body) || non_empty(&self.html_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_recipients_in_order() {
        let msg = EmailMessage::new("s")
            .add_to("a@x.com")
            .add_cc("b@x.com")
            .add_bcc("c@x.com")
            .add_to("d@x.com");
        let all: Vec<&str> = msg.recipients().map(|r| r.address.as_str()).collect();
        assert_eq!(all, ["a@x.com", "d@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(msg.recipient_count(), 4);
    }

    #[test]
    fn derived_message_leaves_original_untouched() {
        let original = EmailMessage::new("s").add_to("a@x.com");
        let derived = original.clone().with_from("noreply@x.com");
        assert!(original.from.is_none());
        assert_eq!(derived.from, Some(EmailAddress::new("noreply@x.com")));
    }

    #[test]
    fn whitespace_body_does_not_count() {
        assert!(!EmailMessage::new("s").has_body());
        assert!(!EmailMessage::new("s").with_text_body("  \n").has_body());
        assert!(EmailMessage::new("s").with_html_body("<p>hi</p>").has_body());
    }

    #[test]
    fn priority_header_values() {
        assert_eq!(Priority::High.x_priority(), "1");
        assert_eq!(Priority::Normal.x_priority(), "3");
        assert_eq!(Priority::Low.x_priority(), "5");
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
