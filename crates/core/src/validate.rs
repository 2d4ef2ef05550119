//! Structural checks applied to a message before any provider call.
//!
//! Every rule is evaluated and every violation reported, so a caller fixing a
//! rejected message sees all of its defects at once.

use crate::message::EmailMessage;

/// Maximum combined `to` + `cc` + `bcc` recipients the provider accepts per
/// message.
pub const MAX_RECIPIENTS: usize = 50;

/// Reported when `to` is empty and recipients are required.
pub const RECIPIENT_REQUIRED: &str = "at least one 'to' recipient is required";

/// Reported when neither body has content.
pub const BODY_REQUIRED: &str = "a plain-text or HTML body is required";

/// Reported when the message has no sender after defaults are applied.
pub const SENDER_REQUIRED: &str = "a sender address is required";

/// Validate `message` against the provider's structural limits.
///
/// Beyond the recipient, body, address and attachment rules, the sender is
/// checked too: a message with no sender, or an invalid one, is rejected
/// here rather than by the provider.
///
/// Returns an empty list when the message is acceptable. With
/// `require_recipients = false` the `to` list may be empty, which is how a
/// broadcast template is checked before recipients are injected per chunk.
///
/// # Examples
///
/// ```
/// use outpost_core::{EmailMessage, validate::{validate_message, BODY_REQUIRED}};
///
/// let msg = EmailMessage::new("hi").with_from("a@example.com").add_to("b@example.com");
/// let errors = validate_message(&msg, true);
/// assert_eq!(errors, vec![BODY_REQUIRED.to_owned()]);
/// ```
pub fn validate_message(message: &EmailMessage, require_recipients: bool) -> Vec<String> {
    let mut errors = Vec::new();

    if require_recipients && message.to.is_empty() {
        errors.push(RECIPIENT_REQUIRED.to_owned());
    }

    // No server-side template fallback exists, so a body must be supplied.
    if !message.has_body() {
        errors.push(BODY_REQUIRED.to_owned());
    }

    let count = message.recipient_count();
    if count > MAX_RECIPIENTS {
        errors.push(format!(
            "recipient count {count} exceeds the provider limit of {MAX_RECIPIENTS}"
        ));
    }

    for recipient in message.recipients().filter(|r| !r.is_valid()) {
        errors.push(format!("invalid recipient address '{}'", recipient.address));
    }
    if let Some(reply_to) = message.reply_to.as_ref().filter(|r| !r.is_valid()) {
        errors.push(format!("invalid reply-to address '{}'", reply_to.address));
    }

    for attachment in &message.attachments {
        if !attachment.has_content() {
            errors.push(format!("attachment '{}' has no content", attachment.filename));
        }
        if attachment.content_type.trim().is_empty() {
            errors.push(format!(
                "attachment '{}' has no content type",
                attachment.filename
            ));
        }
    }

    match &message.from {
        None => errors.push(SENDER_REQUIRED.to_owned()),
        Some(from) if !from.is_valid() => {
            errors.push(format!("invalid sender address '{}'", from.address));
        }
        Some(_) => {}
    }

    errors
}
