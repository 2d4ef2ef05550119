//! Outpost Simulation Framework
//!
//! Tools for exercising the dispatch engine without a real provider:
//!
//! - A recording client that captures every submission, simulates the
//!   submit/poll lifecycle and tracks in-flight concurrency
//! - Configurable failure injection (status codes, `Retry-After` hints)
//! - Assertions for verifying results and bulk responses
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use outpost_core::{EmailAddress, EmailMessage};
//! use outpost_executor::{BulkSettings, EmailSender, SendSettings};
//! use outpost_simulation::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = Arc::new(RecordingClient::new("sim"));
//!     let sender = EmailSender::new(
//!         client.clone(),
//!         SendSettings::default().with_default_sender("news@example.com"),
//!         BulkSettings::default().with_inter_chunk_delay(std::time::Duration::ZERO),
//!     )
//!     .unwrap();
//!
//!     let template = EmailMessage::new("Launch").with_text_body("We are live");
//!     let recipients: Vec<EmailAddress> = (0..120)
//!         .map(|i| EmailAddress::new(format!("user{i}@example.com")))
//!         .collect();
//!     let response = sender
//!         .send_bulk_shared(template, recipients, false, &CancellationToken::new())
//!         .await
//!         .unwrap();
//!
//!     response.assert_counts(120, 0);
//!     assert_eq!(client.chunk_sizes(), [50, 50, 20]);
//! }
//! ```

pub mod assertions;
pub mod provider;

pub use assertions::{BulkResponseExt, SendResultExt};
pub use provider::{CapturedSubmit, FailureMode, FailureStyle, RecordingClient};

/// Prelude module for convenient imports.
///
/// ```
/// use outpost_simulation::prelude::*;
/// ```
pub mod prelude {
    pub use crate::assertions::{BulkResponseExt, SendResultExt};
    pub use crate::provider::{CapturedSubmit, FailureMode, FailureStyle, RecordingClient};
}
