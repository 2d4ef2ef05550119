use base64::Engine;
use outpost_core::{AttachmentContent, EmailAddress, EmailMessage, Priority};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::io::AsyncReadExt;

use crate::error::ProviderError;

/// A message rendered into the shape a client submits to its provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Provider-native request body.
    pub body: Value,
    /// Number of recipients addressed by the request.
    pub recipient_count: usize,
}

/// Render `message` into a provider-neutral JSON request.
///
/// Streamed attachments are read to the end and base64-encoded. The sender
/// must already be resolved; a message without one is a serialization error.
///
/// # Examples
///
/// ```
/// # async fn example() -> Result<(), outpost_provider::ProviderError> {
/// use outpost_core::EmailMessage;
/// use outpost_provider::build_json_request;
///
/// let msg = EmailMessage::new("Hi")
///     .with_from("noreply@example.com")
///     .add_to("user@example.com")
///     .with_text_body("Hello");
/// let request = build_json_request(&msg).await?;
/// assert_eq!(request.body["senderAddress"], "noreply@example.com");
/// # Ok(())
/// # }
/// ```
pub async fn build_json_request(message: &EmailMessage) -> Result<ProviderRequest, ProviderError> {
    let from = message
        .from
        .as_ref()
        .ok_or_else(|| ProviderError::Serialization("message has no sender".to_owned()))?;

    let mut headers: Map<String, Value> = message
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    if message.priority != Priority::Normal {
        headers.insert(
            "X-Priority".to_owned(),
            Value::String(message.priority.x_priority().to_owned()),
        );
    }

    let mut attachments = Vec::with_capacity(message.attachments.len());
    for attachment in &message.attachments {
        let data = match &attachment.content {
            Some(AttachmentContent::Inline(bytes)) => bytes.to_vec(),
            Some(AttachmentContent::Stream(stream)) => {
                let mut buf = Vec::new();
                stream.open().read_to_end(&mut buf).await.map_err(|e| {
                    ProviderError::Serialization(format!(
                        "failed to read attachment '{}': {e}",
                        attachment.filename
                    ))
                })?;
                buf
            }
            None => {
                return Err(ProviderError::Serialization(format!(
                    "attachment '{}' has no content",
                    attachment.filename
                )));
            }
        };
        attachments.push(json!({
            "name": attachment.filename,
            "contentType": attachment.content_type,
            "contentInBase64": base64::engine::general_purpose::STANDARD.encode(&data),
            "disposition": attachment.disposition,
            "contentId": attachment.content_id,
        }));
    }

    let body = json!({
        "senderAddress": from.address,
        "senderName": from.display_name,
        "recipients": {
            "to": addresses(&message.to),
            "cc": addresses(&message.cc),
            "bcc": addresses(&message.bcc),
        },
        "content": {
            "subject": message.subject,
            "plainText": message.text_body,
            "html": message.html_body,
        },
        "replyTo": message.reply_to.as_ref().map(|r| addresses(std::slice::from_ref(r))),
        "headers": headers,
        "categories": message.categories,
        "customArgs": message.custom_args,
        "attachments": attachments,
    });

    Ok(ProviderRequest {
        body,
        recipient_count: message.recipient_count(),
    })
}

fn addresses(list: &[EmailAddress]) -> Vec<Value> {
    list.iter()
        .map(|a| json!({"address": a.address, "displayName": a.display_name}))
        .collect()
}

#[cfg(test)]
mod tests {
    use outpost_core::{Attachment, AttachmentStream};

    use super::*;

    fn message() -> EmailMessage {
        EmailMessage::new("Report")
            .with_from(EmailAddress::with_name("noreply@example.com", "Reports"))
            .add_to("a@example.com")
            .add_cc("b@example.com")
            .with_text_body("plain")
            .with_html_body("<p>html</p>")
    }

    #[tokio::test]
    async fn renders_recipients_and_content() {
        let request = build_json_request(&message()).await.unwrap();
        assert_eq!(request.recipient_count, 2);
        assert_eq!(request.body["senderName"], "Reports");
        assert_eq!(request.body["recipients"]["to"][0]["address"], "a@example.com");
        assert_eq!(request.body["recipients"]["cc"][0]["address"], "b@example.com");
        assert_eq!(request.body["content"]["subject"], "Report");
        assert_eq!(request.body["content"]["html"], "<p>html</p>");
        assert!(request.body["replyTo"].is_null());
    }

    #[tokio::test]
    async fn priority_becomes_header() {
        let request = build_json_request(&message().with_priority(Priority::High))
            .await
            .unwrap();
        assert_eq!(request.body["headers"]["X-Priority"], "1");

        let normal = build_json_request(&message()).await.unwrap();
        assert!(normal.body["headers"].get("X-Priority").is_none());
    }

    #[tokio::test]
    async fn attachments_are_base64_encoded() {
        let stream = AttachmentStream::new(|| std::io::Cursor::new(b"streamed".to_vec()));
        let msg = message()
            .with_attachment(Attachment::from_bytes("a.txt", "text/plain", "hello"))
            .with_attachment(Attachment::from_stream("b.txt", "text/plain", stream));
        let request = build_json_request(&msg).await.unwrap();
        let atts = request.body["attachments"].as_array().unwrap();
        assert_eq!(atts[0]["contentInBase64"], "aGVsbG8=");
        assert_eq!(atts[1]["contentInBase64"], "c3RyZWFtZWQ=");
        assert_eq!(atts[1]["disposition"], "attachment");
    }

    #[tokio::test]
    async fn missing_sender_is_a_serialization_error() {
        let mut msg = message();
        msg.from = None;
        let err = build_json_request(&msg).await.unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }
}
