//! The provider boundary of the outpost dispatch engine.
//!
//! The dispatcher treats a provider send as an asynchronous operation:
//! render a request, submit it, then poll the returned handle until it is
//! terminal. Everything provider-specific lives behind [`EmailClient`].

pub mod client;
pub mod error;
pub mod log;
pub mod operation;
pub mod request;

pub use client::{DynEmailClient, EmailClient};
pub use error::{ProviderError, is_retryable_status};
pub use log::LogEmailClient;
pub use operation::{OperationHandle, OperationState, OperationStatus, WaitPolicy};
pub use request::{ProviderRequest, build_json_request};
