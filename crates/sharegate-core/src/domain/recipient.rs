//! Recipient address of a grant.
//!
//! The address is informational: it decides where the notification goes, it
//! is never checked when the artifact is downloaded.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ValidationError;

/// A syntactically plausible email address (`local@domain.tld`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Recipient(String);

impl Recipient {
    /// Trims surrounding whitespace and checks the `local@domain.tld` shape.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyRecipient);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidRecipient(trimmed.to_string()));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(ValidationError::InvalidRecipient(trimmed.to_string()));
        };
        let domain_ok = match domain.rsplit_once('.') {
            Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
            None => false,
        };
        if local.is_empty() || domain.contains('@') || !domain_ok {
            return Err(ValidationError::InvalidRecipient(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Recipient {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Recipient> for String {
    fn from(value: Recipient) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("r@example.com")]
    #[case("  warehouse.ops@logistics.co.uk ")]
    #[case("a+b@x.io")]
    fn accepts_plausible_addresses(#[case] input: &str) {
        let recipient = Recipient::parse(input).unwrap();
        assert_eq!(recipient.as_str(), input.trim());
    }

    #[rstest]
    #[case::no_at("example.com")]
    #[case::no_local("@example.com")]
    #[case::no_tld("r@example")]
    #[case::empty_tld("r@example.")]
    #[case::empty_host("r@.com")]
    #[case::inner_space("r @example.com")]
    #[case::double_at("r@x@example.com")]
    fn rejects_malformed_addresses(#[case] input: &str) {
        assert!(matches!(
            Recipient::parse(input),
            Err(ValidationError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn rejects_blank_address() {
        assert_eq!(Recipient::parse("   "), Err(ValidationError::EmptyRecipient));
    }
}
