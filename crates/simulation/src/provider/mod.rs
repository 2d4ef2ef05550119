//! Test clients for simulation testing.
//!
//! The recording client captures every submission, simulates the provider's
//! operation lifecycle and injects failures on demand.

mod recording;

pub use recording::{CapturedSubmit, FailureMode, FailureStyle, RecordingClient};
