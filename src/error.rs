//! Error handler for accounta.

use sqlx::Error as SQLxError;
use thiserror::Error;

/// PostgreSQL `unique_violation` error code.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL `foreign_key_violation` error code.
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub type Result<T> = std::result::Result<T, AccountError>;

/// Enum representing errors raised by the account core.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("an identifier is required")]
    MissingIdentifier,
    #[error("identifier {value:?} is not a valid email address")]
    InvalidIdentifier { value: String },
    #[error("an account with identifier {identifier} already exists")]
    DuplicateIdentifier { identifier: String },
    #[error("credential is too weak: {}", reasons.join(", "))]
    WeakCredential { reasons: Vec<String> },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("missing required attributes: {}", keys.join(", "))]
    MissingRequiredAttribute { keys: Vec<String> },
    #[error("attribute {key:?} is reserved")]
    ReservedAttribute { key: String },
    #[error("account not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is still referenced: {0}")]
    Referenced(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("argon2 error: {0}")]
    Crypto(String),
    #[error("SQL request failed: {0}")]
    Sql(SQLxError),
    #[error("internal error")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl AccountError {
    /// Wrap any error into [`AccountError::Internal`].
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(err))
    }

    /// Translate a database error, promoting constraint violations to their
    /// domain meaning.
    ///
    /// `identifier` is used to fill [`AccountError::DuplicateIdentifier`]
    /// when the unique index rejects the write.
    pub fn from_sql(err: SQLxError, identifier: &str) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return Self::DuplicateIdentifier {
                        identifier: identifier.to_owned(),
                    };
                },
                Some(FOREIGN_KEY_VIOLATION) => {
                    return Self::Referenced(db_err.message().to_owned());
                },
                _ => {},
            }
        }

        Self::Sql(err)
    }
}

impl From<SQLxError> for AccountError {
    fn from(err: SQLxError) -> Self {
        Self::from_sql(err, "")
    }
}

/// Convert foreign errors into [`AccountError::Internal`].
pub trait ToInternal<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToInternal<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn catch(self) -> Result<T> {
        self.map_err(AccountError::internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_list_every_item() {
        let err = AccountError::MissingRequiredAttribute {
            keys: vec!["given_name".into(), "family_name".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing required attributes: given_name, family_name"
        );

        let err = AccountError::WeakCredential {
            reasons: vec!["too short".into()],
        };
        assert_eq!(err.to_string(), "credential is too weak: too short");
    }

    #[test]
    fn test_catch() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("boom"));
        assert!(matches!(res.catch(), Err(AccountError::Internal(_))));
    }

    #[test]
    fn test_non_database_sql_error() {
        let err = AccountError::from_sql(SQLxError::RowNotFound, "a@b.c");
        assert!(matches!(err, AccountError::Sql(SQLxError::RowNotFound)));
    }
}
