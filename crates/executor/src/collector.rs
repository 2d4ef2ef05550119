use std::sync::atomic::{AtomicUsize, Ordering};

use outpost_core::{BulkResponse, SendResult};
use parking_lot::Mutex;

/// Thread-safe, unordered sink for the results of concurrent units.
///
/// The lock is only held for the push itself, never across an await.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: Mutex<Vec<SendResult>>,
    sent: AtomicUsize,
    failed: AtomicUsize,
}

impl ResultCollector {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Mutex::new(Vec::with_capacity(capacity)),
            ..Self::default()
        }
    }

    /// Record one unit's result and bump the matching counter.
    pub fn push(&self, result: SendResult) {
        let counter = if result.success {
            &self.sent
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.results.lock().push(result);
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything collected so far.
    pub fn take_results(&self) -> Vec<SendResult> {
        std::mem::take(&mut *self.results.lock())
    }

    /// Drain into a [`BulkResponse`]. Call once every producer has finished.
    pub fn into_response(self) -> BulkResponse {
        BulkResponse {
            sent: self.sent.into_inner(),
            failed: self.failed.into_inner(),
            results: self.results.into_inner(),
        }
    }
}
