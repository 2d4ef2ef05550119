//! Assertion helpers for verifying dispatch results in simulation tests.

use outpost_core::{BulkResponse, DeliveryState, SendResult};

/// Extension trait for asserting on a single [`SendResult`].
pub trait SendResultExt {
    /// Assert that the result is a confirmed or accepted send.
    ///
    /// # Panics
    ///
    /// Panics if the result is not successful.
    fn assert_sent(&self);

    /// Assert that the result is a failure with the given delivery state.
    ///
    /// # Panics
    ///
    /// Panics if the state differs.
    fn assert_state(&self, state: DeliveryState);

    /// Assert that validation rejected the message with `rule` among the
    /// reported errors.
    ///
    /// # Panics
    ///
    /// Panics if the result is not `Invalid` or `rule` was not reported.
    fn assert_invalid_with(&self, rule: &str);

    /// Assert that the result carries the given provider status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code differs.
    fn assert_status_code(&self, code: u16);
}

impl SendResultExt for SendResult {
    fn assert_sent(&self) {
        assert!(self.success, "expected a successful send, got {self:?}");
    }

    fn assert_state(&self, state: DeliveryState) {
        assert_eq!(
            self.state, state,
            "expected state {state:?} for '{}', got {self:?}",
            self.recipient
        );
    }

    fn assert_invalid_with(&self, rule: &str) {
        self.assert_state(DeliveryState::Invalid);
        assert!(
            self.validation_errors.iter().any(|e| e == rule),
            "expected validation error '{rule}', got {:?}",
            self.validation_errors
        );
    }

    fn assert_status_code(&self, code: u16) {
        assert_eq!(
            self.status_code,
            Some(code),
            "expected status code {code} for '{}', got {self:?}",
            self.recipient
        );
    }
}

/// Extension trait for asserting on a [`BulkResponse`].
pub trait BulkResponseExt {
    /// Assert the sent and failed counts, and that they add up to the number
    /// of results.
    ///
    /// # Panics
    ///
    /// Panics if either count differs or the totals disagree.
    fn assert_counts(&self, sent: usize, failed: usize);

    /// Assert that exactly one result exists for every address in
    /// `recipients`, regardless of order.
    ///
    /// # Panics
    ///
    /// Panics if any recipient is missing, duplicated or unexpected.
    fn assert_covers<'a>(&self, recipients: impl IntoIterator<Item = &'a str>);

    /// The single result for `recipient`.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one result exists for `recipient`.
    fn result_for(&self, recipient: &str) -> &SendResult;
}

impl BulkResponseExt for BulkResponse {
    fn assert_counts(&self, sent: usize, failed: usize) {
        assert_eq!(
            self.sent + self.failed,
            self.results.len(),
            "sent + failed must equal the result count"
        );
        assert_eq!(
            (self.sent, self.failed),
            (sent, failed),
            "expected sent={sent} failed={failed}, got sent={} failed={}",
            self.sent,
            self.failed
        );
    }

    fn assert_covers<'a>(&self, recipients: impl IntoIterator<Item = &'a str>) {
        let mut expected: Vec<&str> = recipients.into_iter().collect();
        let mut actual: Vec<&str> = self.results.iter().map(|r| r.recipient.as_str()).collect();
        expected.sort_unstable();
        actual.sort_unstable();
        assert_eq!(actual, expected, "results do not cover the recipients exactly");
    }

    fn result_for(&self, recipient: &str) -> &SendResult {
        let matches: Vec<&SendResult> = self.results_for(recipient).collect();
        assert_eq!(
            matches.len(),
            1,
            "expected exactly one result for '{recipient}', got {}",
            matches.len()
        );
        matches[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> BulkResponse {
        BulkResponse::from_results(vec![
            SendResult::succeeded("a@x.com", Some("op-1".into())).with_status_code(Some(200)),
            SendResult::invalid("b@x.com", vec!["body required".into()]),
        ])
    }

    #[test]
    fn counts_and_coverage() {
        let response = response();
        response.assert_counts(1, 1);
        response.assert_covers(["b@x.com", "a@x.com"]);
        response.result_for("a@x.com").assert_sent();
        response.result_for("a@x.com").assert_status_code(200);
        response
            .result_for("b@x.com")
            .assert_invalid_with("body required");
    }

    #[test]
    #[should_panic(expected = "expected sent=2 failed=0")]
    fn wrong_counts_fail() {
        response().assert_counts(2, 0);
    }

    #[test]
    #[should_panic(expected = "results do not cover the recipients exactly")]
    fn missing_recipient_fails() {
        response().assert_covers(["a@x.com"]);
    }

    #[test]
    #[should_panic(expected = "expected validation error 'sender required'")]
    fn wrong_rule_fails() {
        response()
            .result_for("b@x.com")
            .assert_invalid_with("sender required");
    }
}
