//! Account manager.
//!
//! [`AccountManager`] is the only factory for [`Account`] values. It owns
//! identifier normalization, credential hashing and privilege flag
//! consistency; storage enforces uniqueness.

use std::sync::Arc;

use crate::account::builder::AccountBuilder;
use crate::account::{
    Account, Attributes, EmailAddress, Flag, FlagOverrides, Password, PasswordHash,
    Privileges, RESERVED_FIELDS,
};
use crate::auth::Authenticator;
use crate::clock::{Clock, SystemClock};
use crate::config::{Configuration, DEFAULT_IDENTIFIER_FIELD};
use crate::crypto::{PasswordHasher, generate_secret};
use crate::error::{AccountError, Result, ToInternal};
use crate::policy::CredentialPolicy;
use crate::repository::{AccountRepository, Page};

/// Settings given to the manager at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Name of the field acting as authentication key.
    pub identifier_field: String,
    pub credential_policy: CredentialPolicy,
    /// Attributes required by [`AccountManager::create_privileged_account`].
    pub privileged_required_attributes: Vec<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_owned(),
            credential_policy: CredentialPolicy::default(),
            privileged_required_attributes: Vec::new(),
        }
    }
}

impl From<&Configuration> for ManagerConfig {
    fn from(config: &Configuration) -> Self {
        Self {
            identifier_field: config.identifier_field.clone(),
            credential_policy: config.credential_policy.clone(),
            privileged_required_attributes: config
                .privileged
                .required_attributes
                .clone(),
        }
    }
}

impl ManagerConfig {
    /// Check the configuration is consistent.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Configuration`] if the identifier field is
    /// not `email`, the only key accounts are stored under, or a required
    /// attribute names a core field.
    pub fn validate(&self) -> Result<()> {
        if self.identifier_field != DEFAULT_IDENTIFIER_FIELD {
            return Err(AccountError::Configuration(format!(
                "unsupported identifier field {:?}, expected {DEFAULT_IDENTIFIER_FIELD:?}",
                self.identifier_field
            )));
        }

        check_required_keys(&self.privileged_required_attributes, &self.identifier_field)
    }
}

fn check_required_keys<S: AsRef<str>>(keys: &[S], identifier_field: &str) -> Result<()> {
    match keys.iter().map(AsRef::as_ref).find(|key| {
        *key == identifier_field || RESERVED_FIELDS.contains(key)
    }) {
        Some(key) => Err(AccountError::Configuration(format!(
            "{key:?} cannot be a required attribute"
        ))),
        None => Ok(()),
    }
}

/// Request to create an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Raw identifier, normalized by the manager.
    pub identifier: String,
    pub secret: Password,
    pub attributes: Attributes,
}

impl NewAccount {
    pub fn new(identifier: impl Into<String>, secret: impl Into<Password>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
            attributes: Attributes::default(),
        }
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

/// Sole factory and administrator of accounts.
#[derive(Clone)]
pub struct AccountManager {
    config: Arc<ManagerConfig>,
    repo: Arc<dyn AccountRepository>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl AccountManager {
    /// Create a new [`AccountManager`].
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Configuration`] if `config` is inconsistent.
    pub fn new(
        config: ManagerConfig,
        repo: Arc<dyn AccountRepository>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            repo,
            hasher,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Authentication flow sharing this manager's collaborators.
    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(
            Arc::clone(&self.repo),
            Arc::clone(&self.hasher),
            Arc::clone(&self.clock),
        )
    }

    /// Create a regular account: active, neither staff nor superuser.
    ///
    /// # Errors
    ///
    /// - [`AccountError::MissingIdentifier`] or
    ///   [`AccountError::InvalidIdentifier`] for a bad identifier.
    /// - [`AccountError::ReservedAttribute`] if an attribute shadows a core
    ///   field.
    /// - [`AccountError::DuplicateIdentifier`] if the normalized identifier
    ///   is taken, including when a concurrent creation wins the race.
    /// - [`AccountError::WeakCredential`] if the policy rejects the secret.
    #[tracing::instrument(skip_all, fields(identifier = %request.identifier))]
    pub async fn create_account(&self, request: NewAccount) -> Result<Account> {
        self.create(request, FlagOverrides::default(), "regular").await
    }

    /// Create an account with flags chosen by a provisioning tool.
    ///
    /// Not for self-registration. A superuser is always staff: an explicit
    /// `is_staff=false` next to `is_superuser=true` is an
    /// [`AccountError::InvariantViolation`].
    #[tracing::instrument(skip_all, fields(identifier = %request.identifier))]
    pub async fn create_account_with_flags(
        &self,
        request: NewAccount,
        flags: FlagOverrides,
    ) -> Result<Account> {
        self.create(request, flags, "provisioned").await
    }

    /// Create an account with every flag on, using the configured required
    /// attributes.
    ///
    /// `flags` holds what the caller explicitly asked for; any `false` is
    /// refused.
    pub async fn create_privileged_account(
        &self,
        request: NewAccount,
        flags: FlagOverrides,
    ) -> Result<Account> {
        let required = self.config.privileged_required_attributes.clone();
        self.create_privileged_account_with(request, flags, required.as_slice())
            .await
    }

    /// Create an account with every flag on.
    ///
    /// # Errors
    ///
    /// - [`AccountError::InvariantViolation`] if the request explicitly
    ///   turns a flag off.
    /// - [`AccountError::MissingRequiredAttribute`] listing every key of
    ///   `required` not supplied.
    /// - Any error of [`AccountManager::create_account`].
    #[tracing::instrument(skip_all, fields(identifier = %request.identifier))]
    pub async fn create_privileged_account_with<S>(
        &self,
        request: NewAccount,
        flags: FlagOverrides,
        required: &[S],
    ) -> Result<Account>
    where
        S: AsRef<str> + Sync,
    {
        for flag in [Flag::Staff, Flag::Superuser, Flag::Active] {
            if flags.get(flag) == Some(false) {
                return Err(AccountError::InvariantViolation(format!(
                    "privileged accounts require {flag}=true"
                )));
            }
        }

        check_required_keys(required, &self.config.identifier_field)?;
        let missing = request.attributes.missing(required);
        if !missing.is_empty() {
            return Err(AccountError::MissingRequiredAttribute { keys: missing });
        }

        self.create(request, FlagOverrides::all(true), "privileged")
            .await
    }

    async fn create(
        &self,
        request: NewAccount,
        flags: FlagOverrides,
        kind: &'static str,
    ) -> Result<Account> {
        let NewAccount {
            identifier,
            secret,
            attributes,
        } = request;

        let identifier = EmailAddress::parse(identifier)?;
        attributes.check_reserved(&self.config.identifier_field)?;
        let privileges = resolve_privileges(flags)?;

        // Fast path only, the unique index decides.
        if self.repo.exists(&identifier).await? {
            return Err(AccountError::DuplicateIdentifier {
                identifier: identifier.to_string(),
            });
        }

        self.config
            .credential_policy
            .validate(&secret, &identifier, &attributes)?;
        let credential = self.hash(secret).await?;

        let mut account = AccountBuilder::new()
            .identifier(identifier)
            .credential(credential)
            .privileges(privileges)
            .attributes(attributes)
            .joined_at(self.clock.now())
            .build();

        let id = self.repo.insert(&account).await?;
        account.id = Some(id);

        metrics::counter!("accounts_created_total", "kind" => kind).increment(1);
        tracing::info!(
            identifier = %account.identifier,
            id = %id,
            kind,
            "account created"
        );

        Ok(account)
    }

    /// Look an account up by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::NotFound`] if no account matches.
    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Account> {
        let identifier = EmailAddress::parse(identifier)?;
        self.repo
            .find_by_identifier(&identifier)
            .await?
            .ok_or(AccountError::NotFound)
    }

    /// Accounts ordered by identifier.
    pub async fn list_accounts(&self, page: Page) -> Result<Vec<Account>> {
        self.repo.list(page).await
    }

    /// Set a single flag. Other flags are left untouched, including by
    /// concurrent calls.
    #[tracing::instrument(skip(self))]
    pub async fn set_privilege(
        &self,
        identifier: &str,
        flag: Flag,
        value: bool,
    ) -> Result<Account> {
        let identifier = EmailAddress::parse(identifier)?;
        let account = self.repo.set_flag(&identifier, flag, value).await?;

        metrics::counter!("account_flags_changed_total", "flag" => flag.as_str())
            .increment(1);
        tracing::info!(
            identifier = %account.identifier,
            %flag,
            value,
            "account flag set"
        );

        Ok(account)
    }

    pub async fn activate(&self, identifier: &str) -> Result<Account> {
        self.set_privilege(identifier, Flag::Active, true).await
    }

    pub async fn deactivate(&self, identifier: &str) -> Result<Account> {
        self.set_privilege(identifier, Flag::Active, false).await
    }

    pub async fn grant_staff(&self, identifier: &str) -> Result<Account> {
        self.set_privilege(identifier, Flag::Staff, true).await
    }

    pub async fn revoke_staff(&self, identifier: &str) -> Result<Account> {
        self.set_privilege(identifier, Flag::Staff, false).await
    }

    pub async fn grant_superuser(&self, identifier: &str) -> Result<Account> {
        self.set_privilege(identifier, Flag::Superuser, true).await
    }

    pub async fn revoke_superuser(&self, identifier: &str) -> Result<Account> {
        self.set_privilege(identifier, Flag::Superuser, false).await
    }

    /// Merge `changes` into the account attributes. A `null` value removes
    /// the key.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update_attributes(
        &self,
        identifier: &str,
        changes: Attributes,
    ) -> Result<Account> {
        changes.check_reserved(&self.config.identifier_field)?;

        let identifier = EmailAddress::parse(identifier)?;
        let account = self.repo.merge_attributes(&identifier, &changes).await?;

        tracing::debug!(identifier = %account.identifier, "attributes updated");
        Ok(account)
    }

    /// Replace the credential with `secret`, checked against the policy.
    #[tracing::instrument(skip(self, secret))]
    pub async fn set_credential(&self, identifier: &str, secret: Password) -> Result<()> {
        let account = self.find_by_identifier(identifier).await?;
        self.config.credential_policy.validate(
            &secret,
            &account.identifier,
            &account.attributes,
        )?;

        let credential = self.hash(secret).await?;
        self.repo
            .update_credential(&account.identifier, &credential)
            .await?;

        tracing::info!(identifier = %account.identifier, "credential replaced");
        Ok(())
    }

    /// Issue a random credential and return it in plaintext.
    ///
    /// The secret cannot be retrieved again.
    #[tracing::instrument(skip(self))]
    pub async fn reset_credential(&self, identifier: &str) -> Result<Password> {
        let account = self.find_by_identifier(identifier).await?;
        let secret = generate_secret();

        let credential = self.hash(secret.clone()).await?;
        self.repo
            .update_credential(&account.identifier, &credential)
            .await?;

        tracing::info!(identifier = %account.identifier, "credential reset");
        Ok(secret)
    }

    /// Hard delete.
    ///
    /// # Errors
    ///
    /// - [`AccountError::NotFound`] if no account matches.
    /// - [`AccountError::Referenced`] if a collaborator row restricts the
    ///   deletion.
    #[tracing::instrument(skip(self))]
    pub async fn delete_account(&self, identifier: &str) -> Result<()> {
        let identifier = EmailAddress::parse(identifier)?;
        self.repo.delete(&identifier).await?;

        tracing::info!(%identifier, "account deleted");
        Ok(())
    }

    async fn hash(&self, secret: Password) -> Result<PasswordHash> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .catch()?
    }
}

/// Apply overrides on the default flags. A superuser is always staff.
fn resolve_privileges(flags: FlagOverrides) -> Result<Privileges> {
    let mut privileges = flags.apply(Privileges::default());

    if privileges.is_superuser && !privileges.is_staff {
        if flags.is_staff == Some(false) {
            return Err(AccountError::InvariantViolation(
                "a superuser must be staff".into(),
            ));
        }
        privileges.is_staff = true;
    }

    Ok(privileges)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::account::{AttributeHolder, CredentialHolder, PrivilegeHolder};
    use crate::clock::FixedClock;
    use crate::config::Argon2;
    use crate::crypto::Argon2Hasher;
    use crate::repository::MemoryAccountRepository;

    const SECRET: &str = "correct-horse-battery";

    struct Setup {
        manager: AccountManager,
        repo: Arc<MemoryAccountRepository>,
        hasher: Arc<Argon2Hasher>,
    }

    fn setup_with(config: ManagerConfig) -> Setup {
        let repo = Arc::new(MemoryAccountRepository::new());
        let hasher = Arc::new(Argon2Hasher::new(&Argon2::testing()).unwrap());
        let manager =
            AccountManager::new(config, repo.clone(), hasher.clone()).unwrap();

        Setup {
            manager,
            repo,
            hasher,
        }
    }

    fn setup() -> Setup {
        setup_with(ManagerConfig {
            privileged_required_attributes: vec![
                "given_name".into(),
                "family_name".into(),
            ],
            ..ManagerConfig::default()
        })
    }

    #[tokio::test]
    async fn test_create_then_lookup() {
        let Setup {
            manager, hasher, ..
        } = setup();
        let joined_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let manager = manager.with_clock(Arc::new(FixedClock(joined_at)));

        let created = manager
            .create_account(NewAccount::new("User@Example.COM", SECRET))
            .await
            .unwrap();
        assert_eq!(created.identifier.as_str(), "User@example.com");
        assert!(created.id().is_some());
        assert_eq!(created.joined_at(), joined_at);
        assert!(created.is_active());
        assert!(!created.is_staff());
        assert!(!created.is_superuser());

        let found = manager.find_by_identifier("user@EXAMPLE.com").await.unwrap();
        assert_eq!(found, created);
        assert!(found.verify_credential(&*hasher, &SECRET.into()));
        assert!(!found.verify_credential(&*hasher, &"correct-horse".into()));
    }

    #[tokio::test]
    async fn test_case_variant_is_duplicate() {
        let Setup { manager, repo, .. } = setup();

        manager
            .create_account(NewAccount::new("User@Example.COM", SECRET))
            .await
            .unwrap();
        let err = manager
            .create_account(NewAccount::new("user@EXAMPLE.com", SECRET))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::DuplicateIdentifier { .. }));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_identifier_persists_nothing() {
        let Setup { manager, repo, .. } = setup();

        for identifier in ["", "   "] {
            let err = manager
                .create_account(NewAccount::new(identifier, "x"))
                .await
                .unwrap_err();
            assert!(matches!(err, AccountError::MissingIdentifier));
        }
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_weak_credential() {
        let Setup { manager, repo, .. } = setup();

        let err = manager
            .create_account(NewAccount::new("someone@example.com", "12345678"))
            .await
            .unwrap_err();

        match err {
            AccountError::WeakCredential { reasons } => assert!(!reasons.is_empty()),
            err => panic!("unexpected error: {err}"),
        }
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_reserved_attribute() {
        let Setup { manager, repo, .. } = setup();

        for key in ["email", "is_superuser", "password"] {
            let err = manager
                .create_account(
                    NewAccount::new("someone@example.com", SECRET)
                        .attribute(key, true),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AccountError::ReservedAttribute { .. }), "{key}");
        }
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_trusted_flag_overrides() {
        let Setup { manager, .. } = setup();

        let account = manager
            .create_account_with_flags(
                NewAccount::new("root@example.com", SECRET),
                FlagOverrides::default().with(Flag::Superuser, true),
            )
            .await
            .unwrap();
        assert!(account.is_superuser());
        assert!(account.is_staff());

        let err = manager
            .create_account_with_flags(
                NewAccount::new("other@example.com", SECRET),
                FlagOverrides::default()
                    .with(Flag::Superuser, true)
                    .with(Flag::Staff, false),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvariantViolation(_)));

        // The self-registration path has no way to carry flags.
        let account = manager
            .create_account(NewAccount::new("self@example.com", SECRET))
            .await
            .unwrap();
        assert_eq!(account.privileges(), Privileges::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_single_winner() {
        let Setup { manager, repo, .. } = setup();

        let tasks: Vec<_> = ["Race@Example.com", "race@example.COM", "RACE@EXAMPLE.COM", "race@example.com"]
            .into_iter()
            .map(|identifier| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager
                        .create_account(NewAccount::new(identifier, SECRET))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(AccountError::DuplicateIdentifier { .. }) => {},
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_privileged_account_has_every_flag() {
        let Setup { manager, .. } = setup();

        let account = manager
            .create_privileged_account(
                NewAccount::new("admin@example.com", SECRET)
                    .attribute("given_name", "Ada")
                    .attribute("family_name", "Lovelace"),
                FlagOverrides::default(),
            )
            .await
            .unwrap();

        assert!(account.is_active());
        assert!(account.is_staff());
        assert!(account.is_superuser());
        assert_eq!(
            account.attribute("given_name").and_then(|v| v.as_str()),
            Some("Ada")
        );
    }

    #[tokio::test]
    async fn test_privileged_rejects_explicit_false() {
        let Setup { manager, repo, .. } = setup();

        for flag in [Flag::Staff, Flag::Superuser, Flag::Active] {
            let err = manager
                .create_privileged_account_with(
                    NewAccount::new("admin@example.com", SECRET),
                    FlagOverrides::default().with(flag, false),
                    &[] as &[&str],
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AccountError::InvariantViolation(_)), "{flag}");
        }
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_privileged_missing_attributes_writes_nothing() {
        let Setup { manager, repo, .. } = setup();

        let err = manager
            .create_privileged_account(
                NewAccount::new("admin@example.com", SECRET)
                    .attribute("family_name", "   "),
                FlagOverrides::default(),
            )
            .await
            .unwrap_err();

        match err {
            AccountError::MissingRequiredAttribute { keys } => {
                assert_eq!(keys, vec!["given_name", "family_name"])
            },
            err => panic!("unexpected error: {err}"),
        }
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_privileged_explicit_keys() {
        let Setup { manager, .. } = setup();

        let err = manager
            .create_privileged_account_with(
                NewAccount::new("admin@example.com", SECRET),
                FlagOverrides::default(),
                &["team"],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccountError::MissingRequiredAttribute { ref keys } if keys == &["team"]
        ));

        let err = manager
            .create_privileged_account_with(
                NewAccount::new("admin@example.com", SECRET),
                FlagOverrides::all(true),
                &["email"],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Configuration(_)));
    }

    #[test]
    fn test_config_validation() {
        let config = ManagerConfig {
            privileged_required_attributes: vec!["is_staff".into()],
            ..ManagerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AccountError::Configuration(_))
        ));

        let config = ManagerConfig {
            privileged_required_attributes: vec!["email".into()],
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());

        for field in ["username", "contact", " ", "Email"] {
            let config = ManagerConfig {
                identifier_field: field.into(),
                ..ManagerConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(AccountError::Configuration(_))),
                "{field:?}"
            );
        }
        assert!(ManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unsupported_identifier_field_is_refused() {
        let config = ManagerConfig {
            identifier_field: "username".into(),
            ..ManagerConfig::default()
        };
        let result = AccountManager::new(
            config,
            Arc::new(MemoryAccountRepository::new()),
            Arc::new(Argon2Hasher::new(&Argon2::testing()).unwrap()),
        );
        assert!(matches!(result, Err(AccountError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_flag_mutations_are_independent() {
        let Setup { manager, .. } = setup();
        manager
            .create_account(NewAccount::new("staff@example.com", SECRET))
            .await
            .unwrap();

        let account = manager.grant_superuser("staff@example.com").await.unwrap();
        assert!(account.is_superuser());
        assert!(!account.is_staff());

        manager.grant_staff("staff@example.com").await.unwrap();
        manager.revoke_superuser("staff@example.com").await.unwrap();
        let account = manager.deactivate("STAFF@example.com").await.unwrap();
        assert!(!account.is_active());
        assert!(account.is_staff());
        assert!(!account.is_superuser());

        let stored = manager.find_by_identifier("staff@example.com").await.unwrap();
        assert_eq!(stored.privileges(), account.privileges());

        let account = manager.activate("staff@example.com").await.unwrap();
        assert!(account.is_active());
        let account = manager.revoke_staff("staff@example.com").await.unwrap();
        assert!(!account.is_staff());

        assert!(matches!(
            manager.activate("ghost@example.com").await,
            Err(AccountError::NotFound)
        ));
    }

    /// Repository whose lookups lag behind writes.
    struct SlowReads(MemoryAccountRepository);

    #[async_trait::async_trait]
    impl AccountRepository for SlowReads {
        async fn exists(&self, identifier: &EmailAddress) -> Result<bool> {
            self.0.exists(identifier).await
        }

        async fn insert(&self, account: &Account) -> Result<crate::account::AccountId> {
            self.0.insert(account).await
        }

        async fn find_by_identifier(
            &self,
            identifier: &EmailAddress,
        ) -> Result<Option<Account>> {
            let account = self.0.find_by_identifier(identifier).await;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            account
        }

        async fn list(&self, page: Page) -> Result<Vec<Account>> {
            self.0.list(page).await
        }

        async fn set_flag(
            &self,
            identifier: &EmailAddress,
            flag: Flag,
            value: bool,
        ) -> Result<Account> {
            self.0.set_flag(identifier, flag, value).await
        }

        async fn merge_attributes(
            &self,
            identifier: &EmailAddress,
            changes: &Attributes,
        ) -> Result<Account> {
            self.0.merge_attributes(identifier, changes).await
        }

        async fn update_credential(
            &self,
            identifier: &EmailAddress,
            credential: &crate::account::PasswordHash,
        ) -> Result<()> {
            self.0.update_credential(identifier, credential).await
        }

        async fn touch_last_authenticated(
            &self,
            identifier: &EmailAddress,
            at: chrono::DateTime<Utc>,
        ) -> Result<()> {
            self.0.touch_last_authenticated(identifier, at).await
        }

        async fn delete(&self, identifier: &EmailAddress) -> Result<()> {
            self.0.delete(identifier).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_kept() {
        let manager = AccountManager::new(
            ManagerConfig::default(),
            Arc::new(SlowReads(MemoryAccountRepository::new())),
            Arc::new(Argon2Hasher::new(&Argon2::testing()).unwrap()),
        )
        .unwrap();
        manager
            .create_account(NewAccount::new("race@example.com", SECRET))
            .await
            .unwrap();

        let (deactivated, staff) = tokio::join!(
            manager.deactivate("race@example.com"),
            manager.grant_staff("race@example.com"),
        );
        deactivated.unwrap();
        staff.unwrap();

        let (bio, locale) = tokio::join!(
            manager.update_attributes(
                "race@example.com",
                Attributes::new().with("bio", "hello"),
            ),
            manager.update_attributes(
                "race@example.com",
                Attributes::new().with("locale", "fr"),
            ),
        );
        bio.unwrap();
        locale.unwrap();

        let stored = manager.find_by_identifier("race@example.com").await.unwrap();
        assert!(!stored.is_active());
        assert!(stored.is_staff());
        assert_eq!(stored.attribute("bio").and_then(|v| v.as_str()), Some("hello"));
        assert_eq!(stored.attribute("locale").and_then(|v| v.as_str()), Some("fr"));
    }

    #[tokio::test]
    async fn test_update_attributes() {
        let Setup { manager, .. } = setup();
        manager
            .create_account(
                NewAccount::new("bio@example.com", SECRET)
                    .attribute("bio", "hello")
                    .attribute("birth_date", "1990-01-01"),
            )
            .await
            .unwrap();

        let changes = Attributes::new()
            .with("bio", "updated")
            .with("birth_date", serde_json::Value::Null);
        let account = manager
            .update_attributes("bio@example.com", changes)
            .await
            .unwrap();
        assert_eq!(account.attribute("bio").and_then(|v| v.as_str()), Some("updated"));
        assert!(account.attribute("birth_date").is_none());

        let err = manager
            .update_attributes("bio@example.com", Attributes::new().with("email", "x@y.z"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::ReservedAttribute { .. }));

        let stored = manager.find_by_identifier("bio@example.com").await.unwrap();
        assert_eq!(stored.attributes(), account.attributes());
    }

    #[tokio::test]
    async fn test_credential_replacement() {
        let Setup {
            manager, hasher, ..
        } = setup();
        manager
            .create_account(NewAccount::new("reset@example.com", SECRET))
            .await
            .unwrap();

        let err = manager
            .set_credential("reset@example.com", "short".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::WeakCredential { .. }));

        manager
            .set_credential("reset@example.com", "tangerine-orbit-lantern".into())
            .await
            .unwrap();
        let account = manager.find_by_identifier("reset@example.com").await.unwrap();
        assert!(account.verify_credential(&*hasher, &"tangerine-orbit-lantern".into()));
        assert!(!account.verify_credential(&*hasher, &SECRET.into()));

        let secret = manager.reset_credential("reset@example.com").await.unwrap();
        assert_eq!(secret.as_str().len(), crate::crypto::GENERATED_SECRET_LENGTH);
        let account = manager.find_by_identifier("reset@example.com").await.unwrap();
        assert!(account.verify_credential(&*hasher, &secret));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let Setup { manager, repo, .. } = setup();
        for identifier in ["b@example.com", "A@example.com", "c@example.com"] {
            manager
                .create_account(NewAccount::new(identifier, SECRET))
                .await
                .unwrap();
        }

        let accounts = manager.list_accounts(Page::default()).await.unwrap();
        let identifiers: Vec<_> =
            accounts.iter().map(|a| a.identifier.as_str()).collect();
        assert_eq!(identifiers, ["A@example.com", "b@example.com", "c@example.com"]);

        let page = manager
            .list_accounts(Page {
                limit: 1,
                offset: 1,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].identifier.as_str(), "b@example.com");

        manager.delete_account("a@EXAMPLE.com").await.unwrap();
        assert_eq!(repo.len(), 2);
        assert!(matches!(
            manager.delete_account("a@example.com").await,
            Err(AccountError::NotFound)
        ));
        assert!(matches!(
            manager.find_by_identifier("a@example.com").await,
            Err(AccountError::NotFound)
        ));
    }
}
