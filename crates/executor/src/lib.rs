//! Dispatch orchestration for outpost.
//!
//! [`EmailSender`] drives single sends, chunked broadcasts and
//! bounded-concurrency personalized fan-outs over a provider client,
//! retrying throttled or failing submissions with [`BackoffPolicy`] and
//! polling operations with [`poll_operation`].

pub mod batch;
pub mod broadcast;
pub mod collector;
pub mod config;
pub mod error;
pub mod executor;
pub mod poller;
pub mod retry;

pub use collector::ResultCollector;
pub use config::{BulkConfig, BulkSettings, ConfigError, DispatchConfig, SendSettings};
pub use error::{Cancelled, DispatchError, StepError};
pub use executor::EmailSender;
pub use poller::{PollPhase, PollPolicy, PolledOperation, poll_operation};
pub use retry::{BackoffPolicy, with_retry};
