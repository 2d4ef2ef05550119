//! Core data model for the outpost dispatch engine: messages, addresses,
//! attachments, per-recipient results, and the structural validator applied
//! before anything is handed to a provider.

pub mod address;
pub mod attachment;
pub mod message;
pub mod outcome;
pub mod validate;

pub use address::EmailAddress;
pub use attachment::{Attachment, AttachmentContent, AttachmentReader, AttachmentStream, Disposition};
pub use message::{EmailMessage, Priority};
pub use outcome::{BulkResponse, DeliveryState, SendResult};
pub use validate::{MAX_RECIPIENTS, validate_message};
