//! Account entity.
//!
//! The entity is assembled from four capabilities instead of one large base
//! type: [`Identified`], [`CredentialHolder`], [`PrivilegeHolder`] and
//! [`AttributeHolder`]. Collaborators depend on the narrowest one they need.

mod attributes;
pub(crate) mod builder;
mod credential;
mod identifier;
mod privileges;

pub use attributes::*;
pub use credential::*;
pub use identifier::*;
pub use privileges::*;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::PasswordHasher;

/// Surrogate key assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Holds the unique authentication key.
pub trait Identified {
    fn identifier(&self) -> &EmailAddress;
}

/// Holds a one-way derived credential.
pub trait CredentialHolder {
    fn credential_hash(&self) -> &PasswordHash;

    /// Check `secret` against the stored hash.
    ///
    /// Blocking: derivation is deliberately slow.
    fn verify_credential(
        &self,
        hasher: &dyn PasswordHasher,
        secret: &Password,
    ) -> bool {
        hasher.verify(secret, self.credential_hash())
    }
}

/// Holds status and privilege flags.
pub trait PrivilegeHolder {
    fn privileges(&self) -> Privileges;

    fn is_active(&self) -> bool {
        self.privileges().is_active
    }

    fn is_staff(&self) -> bool {
        self.privileges().is_staff
    }

    fn is_superuser(&self) -> bool {
        self.privileges().is_superuser
    }
}

/// Holds project-defined attributes.
pub trait AttributeHolder {
    fn attributes(&self) -> &Attributes;

    fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes().get(key)
    }
}

/// Account as persisted.
///
/// Instances are produced by [`crate::manager::AccountManager`] or restored
/// from storage through [`crate::repository::AccountRecord`]; fields cannot
/// be assigned from outside the crate. The credential hash is never
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<AccountId>,
    pub(crate) identifier: EmailAddress,
    #[serde(skip)]
    pub(crate) credential: PasswordHash,
    #[serde(flatten)]
    pub(crate) privileges: Privileges,
    pub(crate) joined_at: DateTime<Utc>,
    pub(crate) last_authenticated_at: Option<DateTime<Utc>>,
    pub(crate) attributes: Attributes,
}

impl Account {
    /// Key assigned on insertion. `None` before the account is saved.
    pub fn id(&self) -> Option<AccountId> {
        self.id
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn last_authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.last_authenticated_at
    }
}

impl Identified for Account {
    fn identifier(&self) -> &EmailAddress {
        &self.identifier
    }
}

impl CredentialHolder for Account {
    fn credential_hash(&self) -> &PasswordHash {
        &self.credential
    }
}

impl PrivilegeHolder for Account {
    fn privileges(&self) -> Privileges {
        self.privileges
    }
}

impl AttributeHolder for Account {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.identifier, f)
    }
}

#[cfg(test)]
mod tests {
    use super::builder::AccountBuilder;
    use super::*;
    use crate::config::Argon2;
    use crate::crypto::Argon2Hasher;

    fn account(hasher: &Argon2Hasher) -> Account {
        AccountBuilder::new()
            .identifier(EmailAddress::parse("User@Example.COM").unwrap())
            .credential(hasher.hash(&Password::new("correct-horse-battery")).unwrap())
            .attributes(Attributes::new().with("bio", "hi"))
            .build()
    }

    #[test]
    fn test_display_is_identifier() {
        let hasher = Argon2Hasher::new(&Argon2::testing()).unwrap();
        let account = account(&hasher);
        assert_eq!(account.to_string(), "User@example.com");
        assert_eq!(account.id(), None);
    }

    #[test]
    fn test_verify_credential() {
        let hasher = Argon2Hasher::new(&Argon2::testing()).unwrap();
        let account = account(&hasher);

        assert!(account.verify_credential(&hasher, &"correct-horse-battery".into()));
        assert!(!account.verify_credential(&hasher, &"correct-horse-batterY".into()));
        assert!(!account.verify_credential(&hasher, &"".into()));
    }

    #[test]
    fn test_serialization_skips_credential() {
        let hasher = Argon2Hasher::new(&Argon2::testing()).unwrap();
        let account = account(&hasher);
        let json = serde_json::to_value(&account).unwrap();

        assert_eq!(json["identifier"], "User@example.com");
        assert_eq!(json["is_active"], true);
        assert_eq!(json["is_staff"], false);
        assert_eq!(json["attributes"]["bio"], "hi");
        assert!(json.get("credential").is_none());
        assert!(json.get("id").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn test_capabilities() {
        fn label(holder: &(impl Identified + PrivilegeHolder)) -> String {
            format!("{} staff={}", holder.identifier(), holder.is_staff())
        }

        let hasher = Argon2Hasher::new(&Argon2::testing()).unwrap();
        let account = account(&hasher);
        assert_eq!(label(&account), "User@example.com staff=false");
        assert_eq!(account.attribute("bio").and_then(Value::as_str), Some("hi"));
    }
}
