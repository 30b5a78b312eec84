//! Password hashing and verification

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;

use super::types::Account;
use crate::config::CredentialConfig;

/// Output length of the client-side digest. A password of exactly this many
/// bytes is almost certainly a digest sent where plaintext was expected.
pub const HASH_OUTPUT_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("invalid password format")]
    InvalidFormat,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Owns the hashing parameters and every read or write of `Account::password`.
#[derive(Clone)]
pub struct CredentialManager {
    argon2: Argon2<'static>,
}

impl CredentialManager {
    pub fn new(config: &CredentialConfig) -> Result<Self, CredentialError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Check a new password without hashing it
    pub fn validate(new_password: &[u8]) -> Result<(), CredentialError> {
        if new_password.is_empty() || new_password.len() == HASH_OUTPUT_LEN {
            return Err(CredentialError::InvalidFormat);
        }
        Ok(())
    }

    /// Hash `new_password` with a fresh salt and store it on the account.
    pub fn set_password(&self, account: &mut Account, new_password: &[u8]) -> Result<(), CredentialError> {
        Self::validate(new_password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(new_password, &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string();

        account.password = Some(hash);
        Ok(())
    }

    /// Compare `candidate` against the stored hash. A mismatch is `Ok(false)`.
    pub fn verify_password(&self, account: &Account, candidate: &[u8]) -> Result<bool, CredentialError> {
        let Some(stored) = account.password.as_deref() else {
            return Ok(false);
        };

        let parsed = PasswordHash::new(stored).map_err(|e| CredentialError::Hashing(e.to_string()))?;

        match self.argon2.verify_password(candidate, &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Hashing(e.to_string())),
        }
    }
}
