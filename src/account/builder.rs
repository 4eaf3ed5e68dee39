//! Typed builder for [`Account`].

use chrono::{DateTime, Utc};

use crate::account::{Account, Attributes, EmailAddress, PasswordHash, Privileges};

/// Value is missing on [`AccountBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`AccountBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

/// A builder tracking presence of the identifier and the hashed credential.
///
/// Only [`AccountBuilder<Present<EmailAddress>, Present<PasswordHash>>`]
/// can be built.
#[derive(Debug, Clone)]
pub(crate) struct AccountBuilder<Identifier, Credential> {
    identifier: Identifier,
    credential: Credential,
    privileges: Privileges,
    attributes: Attributes,
    joined_at: DateTime<Utc>,
}

impl AccountBuilder<Missing, Missing> {
    /// Create a new [`AccountBuilder`].
    pub fn new() -> Self {
        Self {
            identifier: Missing,
            credential: Missing,
            privileges: Privileges::default(),
            attributes: Attributes::default(),
            joined_at: Utc::now(),
        }
    }
}

impl<Credential> AccountBuilder<Missing, Credential> {
    /// Set the normalized identifier.
    pub fn identifier(
        self,
        identifier: EmailAddress,
    ) -> AccountBuilder<Present<EmailAddress>, Credential> {
        AccountBuilder {
            identifier: Present(identifier),
            credential: self.credential,
            privileges: self.privileges,
            attributes: self.attributes,
            joined_at: self.joined_at,
        }
    }
}

impl<Identifier> AccountBuilder<Identifier, Missing> {
    /// Set the already derived credential.
    pub fn credential(
        self,
        hash: PasswordHash,
    ) -> AccountBuilder<Identifier, Present<PasswordHash>> {
        AccountBuilder {
            identifier: self.identifier,
            credential: Present(hash),
            privileges: self.privileges,
            attributes: self.attributes,
            joined_at: self.joined_at,
        }
    }
}

impl<Identifier, Credential> AccountBuilder<Identifier, Credential> {
    pub fn privileges(mut self, privileges: Privileges) -> Self {
        self.privileges = privileges;
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = joined_at;
        self
    }
}

impl AccountBuilder<Present<EmailAddress>, Present<PasswordHash>> {
    /// Build an unsaved [`Account`].
    pub fn build(self) -> Account {
        let AccountBuilder {
            identifier: Present(identifier),
            credential: Present(credential),
            privileges,
            attributes,
            joined_at,
        } = self;

        Account {
            id: None,
            identifier,
            credential,
            privileges,
            joined_at,
            last_authenticated_at: None,
            attributes,
        }
    }
}
