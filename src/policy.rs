//! Credential strength policy.

use serde::{Deserialize, Serialize};

use crate::account::{Attributes, EmailAddress, Password};
use crate::error::{AccountError, Result};

/// Shortest local part considered when comparing a secret to its owner.
const MIN_SIMILARITY_LENGTH: usize = 3;

/// Rules a plaintext secret must satisfy before it is hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialPolicy {
    /// Minimum length, in characters.
    pub min_length: usize,
    /// Maximum length, in characters.
    pub max_length: usize,
    /// Dropbox `zxcvbn` minimal score, from 0 to 4. `None` disables it.
    pub min_strength: Option<u8>,
    /// Reject secrets made only of digits.
    pub reject_numeric: bool,
    /// Reject secrets containing the identifier local part.
    pub reject_similar_to_identifier: bool,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 255,
            min_strength: Some(2),
            reject_numeric: true,
            reject_similar_to_identifier: true,
        }
    }
}

impl CredentialPolicy {
    /// Accept anything non-empty up to `max_length`.
    pub fn lenient() -> Self {
        Self {
            min_length: 1,
            max_length: 255,
            min_strength: None,
            reject_numeric: false,
            reject_similar_to_identifier: false,
        }
    }

    /// Check `secret` for the account owning `identifier` and `attributes`.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::WeakCredential`] listing every failed rule.
    pub fn validate(
        &self,
        secret: &Password,
        identifier: &EmailAddress,
        attributes: &Attributes,
    ) -> Result<()> {
        let value = secret.as_str();
        let length = value.chars().count();
        let mut reasons = Vec::new();

        if length < self.min_length {
            reasons.push(format!(
                "must contain at least {} characters",
                self.min_length
            ));
        }

        if length > self.max_length {
            reasons.push(format!(
                "must contain at most {} characters",
                self.max_length
            ));
        }

        if self.reject_numeric
            && !value.is_empty()
            && value.chars().all(|c| c.is_ascii_digit())
        {
            reasons.push("must not be entirely numeric".to_owned());
        }

        if self.reject_similar_to_identifier && is_similar(value, identifier) {
            reasons.push("is too similar to the identifier".to_owned());
        }

        if let Some(min_strength) = self.min_strength {
            if !value.is_empty() {
                let mut user_inputs =
                    vec![identifier.as_str(), identifier.local_part()];
                user_inputs.extend(attributes.text_values());

                let score = u8::from(zxcvbn::zxcvbn(value, &user_inputs).score());
                if score < min_strength {
                    reasons.push(format!(
                        "strength score {score} is below {min_strength}"
                    ));
                }
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(AccountError::WeakCredential { reasons })
        }
    }
}

fn is_similar(secret: &str, identifier: &EmailAddress) -> bool {
    let local = identifier.local_part().to_lowercase();
    if local.chars().count() < MIN_SIMILARITY_LENGTH {
        return false;
    }

    let secret = secret.to_lowercase();
    secret.contains(&local) || (!secret.is_empty() && local.contains(&secret))
}
