//! PostgreSQL implementation for account repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgQueryResult;

use super::models::AccountRecord;
use crate::account::{Account, AccountId, Attributes, EmailAddress, Flag, PasswordHash};
use crate::error::{AccountError, Result};
use crate::repository::{AccountRepository, Page};

const ACCOUNT_COLUMNS: &str = r#"
    id, identifier, identifier_key, password, flags,
    attributes, joined_at, last_authenticated_at
"#;

/// PostgreSQL account repository.
///
/// Uniqueness is enforced by the `accounts_identifier_key_unique` index.
#[derive(Debug, Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new [`PgAccountRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn expect_row(result: PgQueryResult) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(AccountError::NotFound);
    }

    Ok(())
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn exists(&self, identifier: &EmailAddress) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE identifier_key = $1)",
        )
        .bind(identifier.key())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert(&self, account: &Account) -> Result<AccountId> {
        let record = AccountRecord::from(account);

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO accounts (
                identifier, identifier_key, password, flags,
                attributes, joined_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&record.identifier)
        .bind(&record.identifier_key)
        .bind(&record.password)
        .bind(record.flags)
        .bind(sqlx::types::Json(&record.attributes))
        .bind(record.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| AccountError::from_sql(err, &record.identifier))?;

        Ok(AccountId(id))
    }

    async fn find_by_identifier(
        &self,
        identifier: &EmailAddress,
    ) -> Result<Option<Account>> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE identifier_key = $1"
        );
        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(identifier.key())
            .fetch_optional(&self.pool)
            .await?;

        record.map(Account::try_from).transpose()
    }

    async fn list(&self, page: Page) -> Result<Vec<Account>> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY identifier_key LIMIT $1 OFFSET $2"
        );
        let records = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await?;

        records.into_iter().map(Account::try_from).collect()
    }

    async fn set_flag(
        &self,
        identifier: &EmailAddress,
        flag: Flag,
        value: bool,
    ) -> Result<Account> {
        let query = format!(
            r#"
            UPDATE accounts
            SET flags = CASE WHEN $3 THEN flags | $2 ELSE flags & ~$2 END
            WHERE identifier_key = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(identifier.key())
            .bind(flag.bit())
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        record.ok_or(AccountError::NotFound)?.try_into()
    }

    async fn merge_attributes(
        &self,
        identifier: &EmailAddress,
        changes: &Attributes,
    ) -> Result<Account> {
        let (set, removed) = changes.split_removals();
        let query = format!(
            r#"
            UPDATE accounts
            SET attributes = (attributes || $2) - $3::TEXT[]
            WHERE identifier_key = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<_, AccountRecord>(&query)
            .bind(identifier.key())
            .bind(sqlx::types::Json(&set))
            .bind(&removed)
            .fetch_optional(&self.pool)
            .await?;

        record.ok_or(AccountError::NotFound)?.try_into()
    }

    async fn update_credential(
        &self,
        identifier: &EmailAddress,
        credential: &PasswordHash,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE accounts SET password = $2 WHERE identifier_key = $1",
        )
        .bind(identifier.key())
        .bind(credential.as_str())
        .execute(&self.pool)
        .await?;

        expect_row(result)
    }

    async fn touch_last_authenticated(
        &self,
        identifier: &EmailAddress,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE accounts SET last_authenticated_at = $2 WHERE identifier_key = $1",
        )
        .bind(identifier.key())
        .bind(at)
        .execute(&self.pool)
        .await?;

        expect_row(result)
    }

    async fn delete(&self, identifier: &EmailAddress) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM accounts WHERE identifier_key = $1")
                .bind(identifier.key())
                .execute(&self.pool)
                .await?;

        expect_row(result)
    }
}
