//! Accounta is an account core authenticating by email address.
//!
//! [`AccountManager`] is the single entry point creating and administering
//! [`Account`]s; [`Authenticator`] checks credentials. Both are generic over
//! an [`AccountRepository`], backed by PostgreSQL or kept in memory.
#![forbid(unsafe_code)]

pub mod account;
pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod manager;
pub mod policy;
pub mod repository;
pub mod telemetry;

use std::sync::Arc;

pub use account::{
    Account, AccountId, AttributeHolder, Attributes, CredentialHolder, EmailAddress,
    Flag, FlagOverrides, Identified, Password, PasswordHash, PrivilegeHolder,
    Privileges,
};
pub use auth::Authenticator;
pub use error::{AccountError, Result};
pub use manager::{AccountManager, ManagerConfig, NewAccount};
pub use repository::{AccountRepository, MemoryAccountRepository, Page, PgAccountRepository};

/// Connect to PostgreSQL, run migrations and build the manager.
pub async fn initialize(
    config: Arc<config::Configuration>,
) -> std::result::Result<AccountManager, Box<dyn std::error::Error>> {
    let Some(postgres) = &config.postgres else {
        tracing::error!("missing `postgres` entry on `config.yaml` file");
        return Err(Box::new(AccountError::Configuration(
            "missing `postgres` entry".into(),
        )));
    };

    let db = database::Database::from_config(postgres).await?;

    // execute migrations scripts on start.
    db.migrate().await?;

    let hasher = crypto::Argon2Hasher::new(&config.argon2.clone().unwrap_or_default())?;
    let manager = AccountManager::new(
        ManagerConfig::from(config.as_ref()),
        Arc::new(PgAccountRepository::new(db.postgres)),
        Arc::new(hasher),
    )?;

    Ok(manager)
}
