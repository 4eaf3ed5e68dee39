//! Cryptogragic logics.

use argon2::password_hash::{
    PasswordHash as PhcHash, PasswordHasher as _, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;

use crate::account::{Password, PasswordHash};
use crate::config::Argon2 as ArgonConfig;
use crate::error::{AccountError, Result};

/// Length of credentials generated by [`generate_secret`].
pub const GENERATED_SECRET_LENGTH: usize = 24;

/// One-way derivation of credentials.
///
/// Implementations are stateless and CPU bound; callers on an async runtime
/// run them on a blocking thread.
pub trait PasswordHasher: Send + Sync {
    /// Derive a salted hash in PHC format.
    fn hash(&self, password: &Password) -> Result<PasswordHash>;

    /// Check `password` against `hash`. Never panics on malformed hashes.
    fn verify(&self, password: &Password, hash: &PasswordHash) -> bool;

    /// Whether `hash` was derived with outdated parameters.
    fn needs_rehash(&self, _hash: &PasswordHash) -> bool {
        false
    }
}

/// Argon2id password hasher using PHC string format.
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Create a new [`Argon2Hasher`].
    pub fn new(config: &ArgonConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| AccountError::Crypto(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &Password) -> Result<PasswordHash> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| AccountError::Crypto(err.to_string()))?;

        PasswordHash::parse(hash.to_string())
    }

    fn verify(&self, password: &Password, hash: &PasswordHash) -> bool {
        let Ok(parsed) = PhcHash::new(hash.as_str()) else {
            return false;
        };

        // Parameters are read from the PHC string. Output comparison is
        // constant time.
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    fn needs_rehash(&self, hash: &PasswordHash) -> bool {
        let Ok(parsed) = PhcHash::new(hash.as_str()) else {
            return true;
        };

        if parsed.algorithm != argon2::ARGON2ID_IDENT {
            return true;
        }

        match Params::try_from(&parsed) {
            Ok(params) => {
                params.m_cost() != self.params.m_cost()
                    || params.t_cost() != self.params.t_cost()
                    || params.p_cost() != self.params.p_cost()
            },
            Err(_) => true,
        }
    }
}

/// Generate a random alphanumeric credential.
///
/// Used to issue a new credential; stored ones are never revealed.
pub fn generate_secret() -> Password {
    Password::new(Alphanumeric.sample_string(&mut OsRng, GENERATED_SECRET_LENGTH))
}
