//! Authentication flow.
//!
//! The only writer of `last_authenticated_at`.

use std::sync::Arc;

use crate::account::{Account, CredentialHolder, EmailAddress, Password, PrivilegeHolder};
use crate::clock::Clock;
use crate::crypto::PasswordHasher;
use crate::error::{AccountError, Result, ToInternal};
use crate::repository::AccountRepository;

/// Checks a secret against the account owning an identifier.
#[derive(Clone)]
pub struct Authenticator {
    repo: Arc<dyn AccountRepository>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    /// Create a new [`Authenticator`].
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            hasher,
            clock,
        }
    }

    /// Authenticate `identifier` with `secret` and return the account.
    ///
    /// Unknown identifiers, wrong secrets and inactive accounts all fail
    /// with [`AccountError::InvalidCredentials`]. Storage failures are
    /// returned as is.
    #[tracing::instrument(skip_all, fields(identifier = %identifier))]
    pub async fn authenticate(
        &self,
        identifier: &str,
        secret: Password,
    ) -> Result<Account> {
        let account = match EmailAddress::parse(identifier) {
            Ok(identifier) => self.repo.find_by_identifier(&identifier).await?,
            Err(_) => None,
        };

        let Some(account) = account else {
            // Spend the same time as a real verification.
            self.burn(secret).await?;
            return Err(reject("unknown_identifier"));
        };

        let hasher = Arc::clone(&self.hasher);
        let (mut account, secret, verified) =
            tokio::task::spawn_blocking(move || {
                let verified = account.verify_credential(&*hasher, &secret);
                (account, secret, verified)
            })
            .await
            .catch()?;

        if !verified {
            return Err(reject("invalid_secret"));
        }

        if !account.is_active() {
            return Err(reject("inactive"));
        }

        if self.hasher.needs_rehash(account.credential_hash()) {
            if let Err(err) = self.rehash(&mut account, secret).await {
                tracing::warn!(
                    identifier = %account.identifier,
                    error = %err,
                    "credential rehash failed"
                );
            }
        }

        let now = self.clock.now();
        self.repo
            .touch_last_authenticated(&account.identifier, now)
            .await?;
        account.last_authenticated_at = Some(now);

        metrics::counter!("authentication_attempts_total", "outcome" => "success")
            .increment(1);
        tracing::info!(identifier = %account.identifier, "account authenticated");

        Ok(account)
    }

    async fn burn(&self, secret: Password) -> Result<()> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || {
            let _ = hasher.hash(&secret);
        })
        .await
        .catch()
    }

    async fn rehash(&self, account: &mut Account, secret: Password) -> Result<()> {
        let hasher = Arc::clone(&self.hasher);
        let credential = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .catch()??;

        self.repo
            .update_credential(&account.identifier, &credential)
            .await?;
        account.credential = credential;

        tracing::debug!(identifier = %account.identifier, "credential rehashed");
        Ok(())
    }
}

fn reject(outcome: &'static str) -> AccountError {
    metrics::counter!("authentication_attempts_total", "outcome" => outcome)
        .increment(1);
    tracing::info!(outcome, "authentication refused");

    AccountError::InvalidCredentials
}
