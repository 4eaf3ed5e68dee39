//! Email identifier logic management.

use std::fmt;

use serde::Serialize;
use validator::ValidateEmail;

use crate::error::{AccountError, Result};

/// Value object of a normalized email address used as the authentication
/// key.
///
/// The domain part is case-folded, the local part is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Converts a string into a normalized [`EmailAddress`].
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::MissingIdentifier`] for empty input and
    /// [`AccountError::InvalidIdentifier`] if the normalized value is not an
    /// email address.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(AccountError::MissingIdentifier);
        }

        let normalized = normalize(value);
        if !normalized.validate_email() {
            return Err(AccountError::InvalidIdentifier {
                value: value.to_owned(),
            });
        }

        Ok(Self(normalized))
    }

    /// Key compared by the uniqueness constraint and point lookups.
    ///
    /// Two addresses differing only by letter case are the same account.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Part before the last `@`.
    pub fn local_part(&self) -> &str {
        self.0.rsplit_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }

    /// Part after the last `@`, always lowercase.
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercase the domain part of an address, leaving the local part as is.
///
/// Input without `@` is returned trimmed and otherwise unchanged.
pub fn normalize(value: &str) -> String {
    let value = value.trim();
    match value.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => value.to_owned(),
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_is_case_folded() {
        let email = EmailAddress::parse("User@Example.COM").unwrap();
        assert_eq!(email.as_str(), "User@example.com");
        assert_eq!(email.local_part(), "User");
        assert_eq!(email.domain(), "example.com");
        assert_eq!(email.to_string(), "User@example.com");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "User@Example.COM",
            "  spaced@HOST.org ",
            "plain@example.com",
            "no-at-sign",
            "\"quoted@local\"@Example.Net",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "{raw}");
        }

        let email = EmailAddress::parse("MiXeD@DoMaIn.io").unwrap();
        assert_eq!(EmailAddress::parse(email.as_str()).unwrap(), email);
    }

    #[test]
    fn test_key_ignores_case() {
        let a = EmailAddress::parse("User@Example.COM").unwrap();
        let b = EmailAddress::parse("user@EXAMPLE.com").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_missing_identifier() {
        assert!(matches!(
            EmailAddress::parse(""),
            Err(AccountError::MissingIdentifier)
        ));
        assert!(matches!(
            EmailAddress::parse("   "),
            Err(AccountError::MissingIdentifier)
        ));
    }

    #[test]
    fn test_invalid_identifier() {
        for raw in ["admin", "@example.com", "user@", "a b@example.com"] {
            assert!(
                matches!(
                    EmailAddress::parse(raw),
                    Err(AccountError::InvalidIdentifier { .. })
                ),
                "{raw}"
            );
        }
    }
}
