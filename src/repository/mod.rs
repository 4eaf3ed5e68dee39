//! Account persistence port and its adapters.

mod memory;
mod models;
mod postgres;

pub use memory::MemoryAccountRepository;
pub use models::AccountRecord;
pub use postgres::PgAccountRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::account::{Account, AccountId, Attributes, EmailAddress, Flag, PasswordHash};
use crate::error::Result;

/// Default number of accounts per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Window over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// Port for account persistence.
///
/// Every lookup goes through [`EmailAddress::key`]; implementations must
/// enforce its uniqueness atomically on [`AccountRepository::insert`].
/// Mutations of a missing account return [`crate::AccountError::NotFound`].
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fast existence check. Not authoritative for uniqueness.
    async fn exists(&self, identifier: &EmailAddress) -> Result<bool>;

    /// Persist a new account and return its key.
    ///
    /// Fails with [`crate::AccountError::DuplicateIdentifier`] if the
    /// identifier is taken, leaving storage unchanged.
    async fn insert(&self, account: &Account) -> Result<AccountId>;

    async fn find_by_identifier(
        &self,
        identifier: &EmailAddress,
    ) -> Result<Option<Account>>;

    /// Accounts ordered by identifier key.
    async fn list(&self, page: Page) -> Result<Vec<Account>>;

    /// Set a single flag atomically and return the updated account.
    ///
    /// Other flags are read and written by storage, never by the caller, so
    /// concurrent changes to different flags all persist.
    async fn set_flag(
        &self,
        identifier: &EmailAddress,
        flag: Flag,
        value: bool,
    ) -> Result<Account>;

    /// Merge `changes` into stored attributes atomically and return the
    /// updated account. A `null` value removes the key.
    async fn merge_attributes(
        &self,
        identifier: &EmailAddress,
        changes: &Attributes,
    ) -> Result<Account>;

    async fn update_credential(
        &self,
        identifier: &EmailAddress,
        credential: &PasswordHash,
    ) -> Result<()>;

    async fn touch_last_authenticated(
        &self,
        identifier: &EmailAddress,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Hard delete.
    async fn delete(&self, identifier: &EmailAddress) -> Result<()>;
}
