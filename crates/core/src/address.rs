use std::fmt;

use serde::{Deserialize, Serialize};

/// An email address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    /// The mailbox, e.g. `user@example.com`.
    pub address: String,
    /// Optional human-readable name shown by mail clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl EmailAddress {
    /// Create an address without a display name.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }

    /// Create an address with a display name.
    pub fn with_name(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Structural validity check: an `@` separating a non-empty local part
    /// from a non-empty domain, with no whitespace anywhere.
    ///
    /// This deliberately does not attempt full RFC 5322 parsing; the provider
    /// remains the authority on deliverability.
    ///
    /// # Examples
    ///
    /// ```
    /// use outpost_core::EmailAddress;
    ///
    /// assert!(EmailAddress::new("user@example.com").is_valid());
    /// assert!(!EmailAddress::new("user@").is_valid());
    /// assert!(!EmailAddress::new("example.com").is_valid());
    /// ```
    pub fn is_valid(&self) -> bool {
        let address = self.address.as_str();
        if address.chars().any(char::is_whitespace) {
            return false;
        }
        match address.rsplit_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
            None => false,
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl From<&str> for EmailAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for EmailAddress {
    fn from(address: String) -> Self {
        Self::new(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_addresses() {
        assert!(EmailAddress::new("a@b").is_valid());
        assert!(EmailAddress::new("first.last+tag@mail.example.org").is_valid());
        assert!(EmailAddress::with_name("ops@example.com", "Ops Team").is_valid());
    }

    #[test]
    fn invalid_addresses() {
        assert!(!EmailAddress::new("").is_valid());
        assert!(!EmailAddress::new("@example.com").is_valid());
        assert!(!EmailAddress::new("user@").is_valid());
        assert!(!EmailAddress::new("no-at-sign").is_valid());
        assert!(!EmailAddress::new("user name@example.com").is_valid());
    }

    #[test]
    fn display_includes_name() {
        let addr = EmailAddress::with_name("ops@example.com", "Ops Team");
        assert_eq!(addr.to_string(), "Ops Team <ops@example.com>");
        assert_eq!(EmailAddress::new("a@b").to_string(), "a@b");
    }

    #[test]
    fn deserialize_without_display_name() {
        let addr: EmailAddress =
            serde_json::from_value(serde_json::json!({"address": "a@b.c"})).unwrap();
        assert_eq!(addr, EmailAddress::new("a@b.c"));
    }
}
