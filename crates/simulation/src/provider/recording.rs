//! Recording client that captures every submission for verification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use outpost_provider::{
    EmailClient, OperationHandle, OperationStatus, ProviderError, ProviderRequest, WaitPolicy,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// A captured `submit` call.
#[derive(Debug, Clone)]
pub struct CapturedSubmit {
    /// Wall-clock time of the call.
    pub timestamp: DateTime<Utc>,
    /// One-based call number.
    pub call_number: usize,
    /// Rendered request body.
    pub body: serde_json::Value,
    /// Total recipients in the request.
    pub recipient_count: usize,
    /// Addresses of the `to` recipients, in request order.
    pub to: Vec<String>,
    /// Wait policy requested by the dispatcher.
    pub wait: WaitPolicy,
    /// Status code the simulated provider answered with.
    pub status_code: u16,
}

/// Mode for simulating failures.
#[derive(Debug, Clone, Default)]
pub enum FailureMode {
    /// Never fail.
    #[default]
    None,
    /// Fail every N calls.
    EveryN(usize),
    /// Fail with probability p (0.0 to 1.0).
    Probabilistic(f64),
    /// Fail the first N calls.
    FirstN(usize),
    /// Always fail.
    Always,
}

/// How a simulated failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStyle {
    /// `submit` returns a handle whose terminal status carries the code.
    TerminalStatus,
    /// `submit` returns `Err(ProviderError::Status)` with the code.
    Error,
}

/// An [`EmailClient`] that records every submission and simulates the
/// provider's asynchronous operation lifecycle.
///
/// Successful operations either complete on submit (when the dispatcher asks
/// to wait and no polls are configured) or report `Running` for
/// [`with_polls_until_complete`](Self::with_polls_until_complete) polls. The
/// client also tracks how many submissions are in flight at once.
pub struct RecordingClient {
    name: String,
    calls: Mutex<Vec<CapturedSubmit>>,
    call_count: AtomicUsize,
    poll_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    pending: Mutex<HashMap<String, u32>>,
    delay: Option<Duration>,
    polls_until_complete: u32,
    failure_mode: FailureMode,
    failure_style: FailureStyle,
    failure_status: u16,
    retry_after: Option<Duration>,
}

impl std::fmt::Debug for RecordingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingClient")
            .field("name", &self.name)
            .field("call_count", &self.call_count.load(Ordering::SeqCst))
            .field("delay", &self.delay)
            .field("failure_mode", &self.failure_mode)
            .field("failure_status", &self.failure_status)
            .finish_non_exhaustive()
    }
}

impl RecordingClient {
    /// Create a new recording client with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            poll_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            pending: Mutex::new(HashMap::new()),
            delay: None,
            polls_until_complete: 0,
            failure_mode: FailureMode::None,
            failure_style: FailureStyle::TerminalStatus,
            failure_status: 500,
            retry_after: None,
        }
    }

    /// Hold each submission for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report `Running` for this many polls before completing.
    #[must_use]
    pub fn with_polls_until_complete(mut self, polls: u32) -> Self {
        self.polls_until_complete = polls;
        self
    }

    /// Set the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Status code and reporting style of simulated failures.
    #[must_use]
    pub fn with_failure(mut self, status: u16, style: FailureStyle) -> Self {
        self.failure_status = status;
        self.failure_style = style;
        self
    }

    /// Attach a `Retry-After` hint to simulated failures.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Get all captured submissions.
    pub fn calls(&self) -> Vec<CapturedSubmit> {
        self.calls.lock().clone()
    }

    /// Get the number of submissions.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the number of status polls.
    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    /// Largest number of submissions observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Recipient counts of every submission, in call order.
    pub fn chunk_sizes(&self) -> Vec<usize> {
        let mut calls = self.calls();
        calls.sort_by_key(|c| c.call_number);
        calls.into_iter().map(|c| c.recipient_count).collect()
    }

    /// Clear all captured calls and counters.
    pub fn clear(&self) {
        self.calls.lock().clear();
        self.pending.lock().clear();
        self.call_count.store(0, Ordering::SeqCst);
        self.poll_count.store(0, Ordering::SeqCst);
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    /// Assert that the client was called exactly N times.
    ///
    /// # Panics
    ///
    /// Panics if the client was not called exactly N times.
    pub fn assert_called(&self, n: usize) {
        let count = self.call_count();
        assert_eq!(
            count, n,
            "expected {n} submissions to client '{}', got {count}",
            self.name
        );
    }

    /// Assert that the client was not called.
    ///
    /// # Panics
    ///
    /// Panics if the client was called.
    pub fn assert_not_called(&self) {
        self.assert_called(0);
    }

    /// Assert that no more than `limit` submissions were ever in flight.
    ///
    /// # Panics
    ///
    /// Panics if the peak exceeded `limit`.
    pub fn assert_peak_in_flight_at_most(&self, limit: usize) {
        let peak = self.peak_in_flight();
        assert!(
            peak <= limit,
            "expected at most {limit} concurrent submissions to client '{}', saw {peak}",
            self.name
        );
    }

    /// Get the last captured submission, if any.
    pub fn last_call(&self) -> Option<CapturedSubmit> {
        self.calls.lock().iter().max_by_key(|c| c.call_number).cloned()
    }

    fn should_fail(&self, call_number: usize) -> bool {
        match &self.failure_mode {
            FailureMode::None => false,
            FailureMode::EveryN(n) => call_number.is_multiple_of(*n),
            FailureMode::Probabilistic(p) => rand::random::<f64>() < *p,
            FailureMode::FirstN(n) => call_number <= *n,
            FailureMode::Always => true,
        }
    }

    fn answer(
        &self,
        call_number: usize,
        wait: WaitPolicy,
    ) -> Result<OperationHandle, ProviderError> {
        let id = Uuid::new_v4().to_string();
        if self.should_fail(call_number) {
            let message = format!("simulated failure on call #{call_number}");
            return match self.failure_style {
                FailureStyle::Error => Err(ProviderError::Status {
                    code: self.failure_status,
                    message,
                    retry_after: self.retry_after,
                }),
                FailureStyle::TerminalStatus => {
                    let mut status = OperationStatus::failed(self.failure_status, message);
                    status.retry_after = self.retry_after;
                    Ok(OperationHandle::new(id, status))
                }
            };
        }

        if wait == WaitPolicy::Completed && self.polls_until_complete == 0 {
            return Ok(OperationHandle::new(id, OperationStatus::succeeded()));
        }
        self.pending
            .lock()
            .insert(id.clone(), self.polls_until_complete);
        Ok(OperationHandle::new(id, OperationStatus::running()))
    }
}

impl EmailClient for RecordingClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(
        &self,
        request: &ProviderRequest,
        wait: WaitPolicy,
    ) -> Result<OperationHandle, ProviderError> {
        let call_number = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.answer(call_number, wait);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let to = request.body["recipients"]["to"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|r| r["address"].as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();
        let status_code = match &result {
            Ok(handle) => handle.status.status_code,
            Err(err) => err.status_code().unwrap_or_default(),
        };
        self.calls.lock().push(CapturedSubmit {
            timestamp: Utc::now(),
            call_number,
            body: request.body.clone(),
            recipient_count: request.recipient_count,
            to,
            wait,
            status_code,
        });

        result
    }

    async fn poll_status(&self, handle: &OperationHandle) -> Result<OperationStatus, ProviderError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock();
        let Some(remaining) = pending.get_mut(&handle.id) else {
            return Err(ProviderError::Status {
                code: 404,
                message: format!("unknown operation {}", handle.id),
                retry_after: None,
            });
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(OperationStatus::running());
        }
        pending.remove(&handle.id);
        Ok(OperationStatus::succeeded())
    }
}
