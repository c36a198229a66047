//! Credential Hasher
//!
//! One-way password hashing. New digests are Argon2id PHC strings that carry
//! their own salt and cost parameters; bcrypt digests written by the previous
//! deployment are still accepted for verification.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Argon2id password hasher
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// Create a hasher with explicit Argon2 cost parameters
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> AuthResult<Self> {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(|e| AuthError::Configuration(format!("invalid Argon2 parameters: {}", e)))?;

        Ok(Self { params })
    }

    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        if password.is_empty() {
            return Err(AuthError::validation("password", "Password is required."));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        Ok(hash)
    }

    /// Check a password against a stored digest.
    ///
    /// Mismatches and unreadable digests both yield `false`.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        if is_bcrypt(digest) {
            return bcrypt::verify(password, digest).unwrap_or(false);
        }

        let parsed_hash = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Unreadable password digest: {}", e);
                return false;
            }
        };

        self.argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

fn is_bcrypt(digest: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| digest.starts_with(prefix))
}
