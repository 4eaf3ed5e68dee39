//! In-process account repository.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::account::{Account, AccountId, Attributes, EmailAddress, Flag, PasswordHash};
use crate::error::{AccountError, Result};
use crate::repository::{AccountRepository, Page};

/// Repository keeping accounts in memory, keyed by [`EmailAddress::key`].
///
/// The map entry lock plays the role of the unique index.
#[derive(Debug, Default)]
pub struct MemoryAccountRepository {
    accounts: DashMap<String, Account>,
    sequence: AtomicI64,
}

impl MemoryAccountRepository {
    /// Create a new [`MemoryAccountRepository`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Apply `update` under the entry lock and return the result.
    fn modify(
        &self,
        identifier: &EmailAddress,
        update: impl FnOnce(&mut Account),
    ) -> Result<Account> {
        match self.accounts.get_mut(&identifier.key()) {
            Some(mut account) => {
                update(account.value_mut());
                Ok(account.value().clone())
            },
            None => Err(AccountError::NotFound),
        }
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn exists(&self, identifier: &EmailAddress) -> Result<bool> {
        Ok(self.accounts.contains_key(&identifier.key()))
    }

    async fn insert(&self, account: &Account) -> Result<AccountId> {
        match self.accounts.entry(account.identifier.key()) {
            Entry::Occupied(_) => Err(AccountError::DuplicateIdentifier {
                identifier: account.identifier.to_string(),
            }),
            Entry::Vacant(entry) => {
                let id = AccountId(self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
                let mut stored = account.clone();
                stored.id = Some(id);
                entry.insert(stored);
                Ok(id)
            },
        }
    }

    async fn find_by_identifier(
        &self,
        identifier: &EmailAddress,
    ) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .get(&identifier.key())
            .map(|account| account.value().clone()))
    }

    async fn list(&self, page: Page) -> Result<Vec<Account>> {
        let mut accounts: Vec<(String, Account)> = self
            .accounts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(accounts
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|(_, account)| account)
            .collect())
    }

    async fn set_flag(
        &self,
        identifier: &EmailAddress,
        flag: Flag,
        value: bool,
    ) -> Result<Account> {
        self.modify(identifier, |account| account.privileges.set(flag, value))
    }

    async fn merge_attributes(
        &self,
        identifier: &EmailAddress,
        changes: &Attributes,
    ) -> Result<Account> {
        self.modify(identifier, |account| {
            account.attributes.merge(changes.clone())
        })
    }

    async fn update_credential(
        &self,
        identifier: &EmailAddress,
        credential: &PasswordHash,
    ) -> Result<()> {
        self.modify(identifier, |account| {
            account.credential = credential.clone()
        })
        .map(|_| ())
    }

    async fn touch_last_authenticated(
        &self,
        identifier: &EmailAddress,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.modify(identifier, |account| {
            account.last_authenticated_at = Some(at)
        })
        .map(|_| ())
    }

    async fn delete(&self, identifier: &EmailAddress) -> Result<()> {
        self.accounts
            .remove(&identifier.key())
            .map(|_| ())
            .ok_or(AccountError::NotFound)
    }
}
