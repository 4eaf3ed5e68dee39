//! Database models for PostgreSQL.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::account::{Account, AccountId, Attributes, EmailAddress, PasswordHash, Privileges};
use crate::error::Result;

/// Account record as stored in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRecord {
    pub id: i64,
    pub identifier: String,
    pub identifier_key: String,
    pub password: String,
    pub flags: i32,
    #[sqlx(json)]
    pub attributes: Attributes,
    pub joined_at: DateTime<Utc>,
    pub last_authenticated_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRecord> for Account {
    type Error = crate::error::AccountError;

    /// Restore an [`Account`], re-validating the identifier and requiring a
    /// PHC credential.
    fn try_from(record: AccountRecord) -> Result<Self> {
        Ok(Account {
            id: Some(AccountId(record.id)),
            identifier: EmailAddress::parse(&record.identifier)?,
            credential: PasswordHash::parse(record.password)?,
            privileges: Privileges::from_bits(record.flags),
            joined_at: record.joined_at,
            last_authenticated_at: record.last_authenticated_at,
            attributes: record.attributes,
        })
    }
}

impl From<&Account> for AccountRecord {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.map_or(0, |id| id.0),
            identifier: account.identifier.to_string(),
            identifier_key: account.identifier.key(),
            password: account.credential.as_str().to_owned(),
            flags: account.privileges.bits(),
            attributes: account.attributes.clone(),
            joined_at: account.joined_at,
            last_authenticated_at: account.last_authenticated_at,
        }
    }
}
