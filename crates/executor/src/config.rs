use std::collections::HashMap;
use std::time::Duration;

use outpost_core::{EmailAddress, MAX_RECIPIENTS};
use serde::Deserialize;
use thiserror::Error;

/// Upper bound for [`SendSettings::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Upper bound for [`BulkSettings::max_concurrency`].
pub const MAX_CONCURRENCY_LIMIT: usize = 100;

/// Errors raised while loading or validating dispatch settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting fell outside its allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },

    /// A duration that drives a loop was zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// The configured default sender is not a structurally valid address.
    #[error("invalid default sender '{0}'")]
    InvalidSender(String),

    /// The settings file could not be parsed.
    #[error("failed to parse settings: {0}")]
    Parse(String),
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

/// Settings applied to every send.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use outpost_executor::SendSettings;
///
/// let settings = SendSettings::default()
///     .with_default_sender("noreply@example.com")
///     .with_max_retries(2)
///     .with_polling_interval(Duration::from_millis(500));
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SendSettings {
    /// Sender used when a message has none.
    pub default_sender: Option<EmailAddress>,
    /// Retries after the first submission, 0 to 10.
    pub max_retries: u32,
    /// Poll single sends until the operation is terminal.
    pub wait_for_completion: bool,
    /// How long to poll before reporting a timed-out result.
    pub operation_timeout: Duration,
    /// Delay between status polls.
    pub polling_interval: Duration,
    /// Headers added to messages that do not set them.
    pub default_headers: HashMap<String, String>,
    /// Categories added to every message.
    pub default_categories: Vec<String>,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            default_sender: None,
            max_retries: 3,
            wait_for_completion: true,
            operation_timeout: Duration::from_secs(300),
            polling_interval: Duration::from_secs(1),
            default_headers: HashMap::new(),
            default_categories: Vec::new(),
        }
    }
}

impl SendSettings {
    /// Set the default sender.
    #[must_use]
    pub fn with_default_sender(mut self, sender: impl Into<EmailAddress>) -> Self {
        self.default_sender = Some(sender.into());
        self
    }

    /// Set the retry bound.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enable or disable waiting for completion.
    #[must_use]
    pub fn with_wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    /// Set the polling timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the polling interval.
    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Add a default header.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Add a default category.
    #[must_use]
    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        self.default_categories.push(category.into());
        self
    }

    /// Check every setting against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "max_retries",
            u64::from(self.max_retries),
            0,
            u64::from(MAX_RETRIES_LIMIT),
        )?;
        if self.polling_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("polling_interval"));
        }
        if let Some(sender) = self.default_sender.as_ref().filter(|s| !s.is_valid()) {
            return Err(ConfigError::InvalidSender(sender.address.clone()));
        }
        Ok(())
    }
}

/// Settings applied to bulk sends.
#[derive(Debug, Clone)]
pub struct BulkSettings {
    /// Fan-out units allowed in their network phase at once, 1 to 100.
    pub max_concurrency: usize,
    /// Recipients per broadcast chunk, 1 to the provider recipient limit.
    pub max_chunk_size: usize,
    /// Pause between broadcast chunks.
    pub inter_chunk_delay: Duration,
    /// Poll bulk sends until terminal. Off by default for throughput.
    pub wait_for_completion: bool,
    /// Polling timeout for bulk sends.
    pub operation_timeout: Duration,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            max_chunk_size: MAX_RECIPIENTS,
            inter_chunk_delay: Duration::from_millis(100),
            wait_for_completion: false,
            operation_timeout: Duration::from_secs(600),
        }
    }
}

impl BulkSettings {
    /// Set the fan-out concurrency limit.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the broadcast chunk size.
    #[must_use]
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    /// Set the pause between broadcast chunks.
    #[must_use]
    pub fn with_inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }

    /// Enable or disable waiting for completion on bulk sends.
    #[must_use]
    pub fn with_wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }

    /// Set the bulk polling timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check every setting against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "bulk.max_concurrency",
            self.max_concurrency as u64,
            1,
            MAX_CONCURRENCY_LIMIT as u64,
        )?;
        check_range(
            "bulk.max_chunk_size",
            self.max_chunk_size as u64,
            1,
            MAX_RECIPIENTS as u64,
        )
    }
}

/// Dispatch settings as they appear in a TOML file.
///
/// # Example
///
/// ```toml
/// default_sender = "noreply@example.com"
/// max_retries = 3
/// wait_for_completion = true
/// operation_timeout_seconds = 300
/// polling_interval_ms = 1000
/// default_categories = ["transactional"]
///
/// [default_headers]
/// X-Mailer = "outpost"
///
/// [bulk]
/// max_concurrency = 10
/// max_chunk_size = 50
/// inter_chunk_delay_ms = 100
/// wait_for_completion = false
/// operation_timeout_seconds = 600
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Default sender address.
    #[serde(default)]
    pub default_sender: Option<String>,
    /// Display name for the default sender.
    #[serde(default)]
    pub default_sender_name: Option<String>,
    /// Retries after the first submission.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Poll single sends until terminal.
    #[serde(default = "default_wait_for_completion")]
    pub wait_for_completion: bool,
    /// Polling timeout in seconds.
    #[serde(default = "default_operation_timeout_seconds")]
    pub operation_timeout_seconds: u64,
    /// Polling interval in milliseconds.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Headers added to messages that do not set them.
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
    /// Categories added to every message.
    #[serde(default)]
    pub default_categories: Vec<String>,
    /// Bulk send settings.
    #[serde(default)]
    pub bulk: BulkConfig,
}

/// The `[bulk]` table of a [`DispatchConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct BulkConfig {
    /// Fan-out concurrency limit.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Broadcast chunk size.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Pause between broadcast chunks in milliseconds.
    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,
    /// Poll bulk sends until terminal.
    #[serde(default)]
    pub wait_for_completion: bool,
    /// Bulk polling timeout in seconds.
    #[serde(default = "default_bulk_operation_timeout_seconds")]
    pub operation_timeout_seconds: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_wait_for_completion() -> bool {
    true
}

fn default_operation_timeout_seconds() -> u64 {
    300
}

fn default_polling_interval_ms() -> u64 {
    1000
}

fn default_max_concurrency() -> usize {
    10
}

fn default_max_chunk_size() -> usize {
    MAX_RECIPIENTS
}

fn default_inter_chunk_delay_ms() -> u64 {
    100
}

fn default_bulk_operation_timeout_seconds() -> u64 {
    600
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_chunk_size: default_max_chunk_size(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
            wait_for_completion: false,
            operation_timeout_seconds: default_bulk_operation_timeout_seconds(),
        }
    }
}

impl DispatchConfig {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Convert into runtime settings, validating every bound.
    pub fn into_settings(self) -> Result<(SendSettings, BulkSettings), ConfigError> {
        let default_sender = self.default_sender.map(|address| EmailAddress {
            address,
            display_name: self.default_sender_name,
        });
        let send = SendSettings {
            default_sender,
            max_retries: self.max_retries,
            wait_for_completion: self.wait_for_completion,
            operation_timeout: Duration::from_secs(self.operation_timeout_seconds),
            polling_interval: Duration::from_millis(self.polling_interval_ms),
            default_headers: self.default_headers,
            default_categories: self.default_categories,
        };
        let bulk = BulkSettings {
            max_concurrency: self.bulk.max_concurrency,
            max_chunk_size: self.bulk.max_chunk_size,
            inter_chunk_delay: Duration::from_millis(self.bulk.inter_chunk_delay_ms),
            wait_for_completion: self.bulk.wait_for_completion,
            operation_timeout: Duration::from_secs(self.bulk.operation_timeout_seconds),
        };
        send.validate()?;
        bulk.validate()?;
        Ok((send, bulk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let send = SendSettings::default();
        assert_eq!(send.max_retries, 3);
        assert!(send.wait_for_completion);
        assert_eq!(send.operation_timeout, Duration::from_secs(300));
        assert!(send.validate().is_ok());

        let bulk = BulkSettings::default();
        assert_eq!(bulk.max_concurrency, 10);
        assert_eq!(bulk.max_chunk_size, 50);
        assert!(!bulk.wait_for_completion);
        assert!(bulk.validate().is_ok());
    }

    #[test]
    fn retries_above_limit_rejected() {
        let err = SendSettings::default().with_max_retries(11).validate().unwrap_err();
        assert_eq!(err.to_string(), "max_retries must be between 0 and 10, got 11");
        assert!(SendSettings::default().with_max_retries(10).validate().is_ok());
        assert!(SendSettings::default().with_max_retries(0).validate().is_ok());
    }

    #[test]
    fn concurrency_and_chunk_bounds() {
        assert!(matches!(
            BulkSettings::default().with_max_concurrency(0).validate(),
            Err(ConfigError::OutOfRange { field: "bulk.max_concurrency", .. })
        ));
        assert!(BulkSettings::default().with_max_concurrency(101).validate().is_err());
        assert!(BulkSettings::default().with_max_concurrency(100).validate().is_ok());
        assert!(BulkSettings::default().with_max_chunk_size(0).validate().is_err());
        assert!(BulkSettings::default().with_max_chunk_size(51).validate().is_err());
        assert!(BulkSettings::default().with_max_chunk_size(1).validate().is_ok());
    }

    #[test]
    fn zero_polling_interval_rejected() {
        let err = SendSettings::default()
            .with_polling_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration("polling_interval")));
    }

    #[test]
    fn invalid_default_sender_rejected() {
        let err = SendSettings::default()
            .with_default_sender("not-an-address")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSender(_)));
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let (send, bulk) = DispatchConfig::from_toml_str("")
            .unwrap()
            .into_settings()
            .unwrap();
        assert!(send.default_sender.is_none());
        assert_eq!(send.polling_interval, Duration::from_secs(1));
        assert_eq!(bulk.inter_chunk_delay, Duration::from_millis(100));
        assert_eq!(bulk.operation_timeout, Duration::from_secs(600));
    }

    #[test]
    fn full_toml() {
        let toml = r#"
            default_sender = "noreply@example.com"
            default_sender_name = "Example"
            max_retries = 5
            wait_for_completion = false
            operation_timeout_seconds = 30
            polling_interval_ms = 250
            default_categories = ["transactional"]

            [default_headers]
            X-Mailer = "outpost"

            [bulk]
            max_concurrency = 25
            max_chunk_size = 40
            inter_chunk_delay_ms = 0
            wait_for_completion = true
            operation_timeout_seconds = 60
        "#;
        let (send, bulk) = DispatchConfig::from_toml_str(toml)
            .unwrap()
            .into_settings()
            .unwrap();
        assert_eq!(
            send.default_sender,
            Some(EmailAddress::with_name("noreply@example.com", "Example"))
        );
        assert_eq!(send.max_retries, 5);
        assert!(!send.wait_for_completion);
        assert_eq!(send.operation_timeout, Duration::from_secs(30));
        assert_eq!(send.polling_interval, Duration::from_millis(250));
        assert_eq!(send.default_headers.get("X-Mailer").map(String::as_str), Some("outpost"));
        assert_eq!(send.default_categories, vec!["transactional"]);
        assert_eq!(bulk.max_concurrency, 25);
        assert_eq!(bulk.max_chunk_size, 40);
        assert!(bulk.inter_chunk_delay.is_zero());
        assert!(bulk.wait_for_completion);
        assert_eq!(bulk.operation_timeout, Duration::from_secs(60));
    }

    #[test]
    fn out_of_range_toml_rejected_on_conversion() {
        let config = DispatchConfig::from_toml_str("[bulk]\nmax_chunk_size = 500").unwrap();
        assert!(matches!(
            config.into_settings(),
            Err(ConfigError::OutOfRange { field: "bulk.max_chunk_size", value: 500, .. })
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = DispatchConfig::from_toml_str("max_retries = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
