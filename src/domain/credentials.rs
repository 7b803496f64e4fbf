//! Salted one-way password storage.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::fmt;
use thiserror::Error;
use tokio::task;

use crate::config::SecurityConfig;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Passwords are write-only; nothing can read one back.
    #[error("Password is not a readable attribute")]
    PasswordNotReadable,

    #[error("Invalid Argon2 params: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error("Password hashing task failed: {0}")]
    Task(String),
}

/// The stored Argon2id hash (PHC string) for one principal.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    hash: String,
}

impl Credentials {
    /// Derives a fresh hash with a new random salt.
    pub fn from_plaintext(password: &str, config: &SecurityConfig) -> Result<Self, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = hasher(config)?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;

        Ok(Self {
            hash: hash.to_string(),
        })
    }

    /// Same as [`Credentials::from_plaintext`] but off the async runtime threads.
    pub async fn from_plaintext_blocking(
        password: &str,
        config: &SecurityConfig,
    ) -> Result<Self, CredentialError> {
        let password = password.to_string();
        let config = config.clone();
        task::spawn_blocking(move || Self::from_plaintext(&password, &config))
            .await
            .map_err(|e| CredentialError::Task(e.to_string()))?
    }

    /// Wraps a hash loaded from storage.
    #[must_use]
    pub const fn from_stored(hash: String) -> Self {
        Self { hash }
    }

    #[must_use]
    pub fn stored_hash(&self) -> &str {
        &self.hash
    }

    /// Parameters are read back from the PHC string, so hashes made with older
    /// settings still verify. A corrupt hash never matches.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        let parsed = match PasswordHash::new(&self.hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    pub async fn verify_blocking(&self, password: &str) -> bool {
        let credentials = self.clone();
        let password = password.to_string();
        match task::spawn_blocking(move || credentials.verify(&password)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }

    /// Always fails.
    pub const fn password(&self) -> Result<String, CredentialError> {
        Err(CredentialError::PasswordNotReadable)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials([REDACTED])")
    }
}

fn hasher(config: &SecurityConfig) -> Result<Argon2<'static>, CredentialError> {
    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn test_password_setter() {
        let creds = Credentials::from_plaintext("radius", &fast_config()).unwrap();
        assert!(creds.stored_hash().starts_with("$argon2id$"));
        assert!(!creds.stored_hash().contains("radius"));
    }

    #[test]
    fn test_no_password_getter() {
        let creds = Credentials::from_plaintext("radius", &fast_config()).unwrap();
        assert!(matches!(
            creds.password(),
            Err(CredentialError::PasswordNotReadable)
        ));
    }

    #[test]
    fn test_password_verification() {
        let creds = Credentials::from_plaintext("radius", &fast_config()).unwrap();
        assert!(creds.verify("radius"));
        assert!(!creds.verify("radiusx"));
        assert!(!creds.verify("diamond"));
        assert!(!creds.verify(""));
    }

    #[test]
    fn test_password_salts_are_random() {
        let config = fast_config();
        let a = Credentials::from_plaintext("radius", &config).unwrap();
        let b = Credentials::from_plaintext("radius", &config).unwrap();
        assert_ne!(a.stored_hash(), b.stored_hash());
        assert!(a.verify("radius"));
        assert!(b.verify("radius"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let creds = Credentials::from_stored("not-a-phc-string".to_string());
        assert!(!creds.verify("anything"));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let creds = Credentials::from_plaintext("radius", &fast_config()).unwrap();
        assert_eq!(format!("{creds:?}"), "Credentials([REDACTED])");
    }

    #[tokio::test]
    async fn test_blocking_variants() {
        let creds = Credentials::from_plaintext_blocking("cat", &fast_config())
            .await
            .unwrap();
        assert!(creds.verify_blocking("cat").await);
        assert!(!creds.verify_blocking("dog").await);
    }
}
