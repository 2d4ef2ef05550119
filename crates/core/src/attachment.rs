use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// A boxed async reader produced by an [`AttachmentStream`].
pub type AttachmentReader = Pin<Box<dyn AsyncRead + Send>>;

type Opener = dyn Fn() -> AttachmentReader + Send + Sync;

/// A re-openable source of attachment bytes.
///
/// The stream is described by a factory rather than a single reader so that
/// the same message can be rendered more than once (a broadcast renders one
/// request per chunk) without sharing a half-consumed reader between sends.
#[derive(Clone)]
pub struct AttachmentStream {
    open: Arc<Opener>,
}

impl AttachmentStream {
    /// Wrap a factory that opens a fresh reader on every call.
    ///
    /// # Examples
    ///
    /// ```
    /// use outpost_core::AttachmentStream;
    ///
    /// let stream = AttachmentStream::new(|| std::io::Cursor::new(b"report".to_vec()));
    /// let _reader = stream.open();
    /// ```
    pub fn new<F, R>(open: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: AsyncRead + Send + 'static,
    {
        Self {
            open: Arc::new(move || Box::pin(open()) as AttachmentReader),
        }
    }

    /// Open a new reader positioned at the start of the content.
    pub fn open(&self) -> AttachmentReader {
        (self.open)()
    }
}

impl fmt::Debug for AttachmentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttachmentStream(..)")
    }
}

/// The bytes of an attachment, held in memory or read on demand.
#[derive(Debug, Clone)]
pub enum AttachmentContent {
    /// Content already in memory.
    Inline(Bytes),
    /// Content read asynchronously when the provider request is built.
    Stream(AttachmentStream),
}

/// How a mail client should present an attachment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Rendered in the body, usually referenced through a content id.
    Inline,
    /// Offered as a downloadable file.
    #[default]
    Attachment,
}

/// A file attached to an [`EmailMessage`](crate::EmailMessage).
#[derive(Debug, Clone)]
pub struct Attachment {
    /// File name presented to the recipient.
    pub filename: String,
    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,
    /// The attachment bytes. `None` is representable so that the validator
    /// can report it instead of the provider rejecting the request.
    pub content: Option<AttachmentContent>,
    /// Inline or regular attachment.
    pub disposition: Disposition,
    /// Content id used by `cid:` references in an HTML body.
    pub content_id: Option<String>,
}

impl Attachment {
    /// An attachment whose content is already in memory.
    pub fn from_bytes(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content: Some(AttachmentContent::Inline(data.into())),
            disposition: Disposition::Attachment,
            content_id: None,
        }
    }

    /// An attachment read from a stream when the request is built.
    pub fn from_stream(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        stream: AttachmentStream,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content: Some(AttachmentContent::Stream(stream)),
            disposition: Disposition::Attachment,
            content_id: None,
        }
    }

    /// Mark the attachment as inline and give it a content id.
    #[must_use]
    pub fn inline_as(mut self, content_id: impl Into<String>) -> Self {
        self.disposition = Disposition::Inline;
        self.content_id = Some(content_id.into());
        self
    }

    /// Whether the attachment carries content in one of the two forms.
    /// An empty in-memory buffer counts as missing content.
    pub fn has_content(&self) -> bool {
        match &self.content {
            Some(AttachmentContent::Inline(data)) => !data.is_empty(),
            Some(AttachmentContent::Stream(_)) => true,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[test]
    fn bytes_attachment_has_content() {
        let att = Attachment::from_bytes("a.txt", "text/plain", "hello");
        assert!(att.has_content());
        assert_eq!(att.disposition, Disposition::Attachment);
    }

    #[test]
    fn empty_bytes_count_as_missing() {
        let att = Attachment::from_bytes("a.txt", "text/plain", Bytes::new());
        assert!(!att.has_content());
    }

    #[test]
    fn inline_as_sets_disposition() {
        let att = Attachment::from_bytes("logo.png", "image/png", vec![1u8, 2, 3]).inline_as("logo");
        assert_eq!(att.disposition, Disposition::Inline);
        assert_eq!(att.content_id.as_deref(), Some("logo"));
    }

    #[tokio::test]
    async fn stream_reopens_from_start() {
        let stream = AttachmentStream::new(|| std::io::Cursor::new(b"abc".to_vec()));
        for _ in 0..2 {
            let mut buf = Vec::new();
            stream.open().read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, b"abc");
        }
    }
}
