use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{Error, Result};

const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Hashing primitive for secrets at rest (account credentials and session
/// tokens). Digests are self-describing strings.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String>;
    fn verify(&self, secret: &str, digest: &str) -> Result<bool>;
}

pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Argon2Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS)
    }

    /// Minimal-cost parameters for tests and local development.
    #[must_use]
    pub fn low_cost() -> Self {
        Self::with_cost(Params::MIN_M_COST.max(8 * ARGON2_PARALLELISM), 1)
    }

    fn with_cost(memory_kib: u32, iterations: u32) -> Self {
        let params = Params::new(
            memory_kib,
            iterations,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| Error::Config(format!("failed to hash secret: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, digest: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(digest)
            .map_err(|e| Error::Config(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify secret: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_correct_and_wrong_secret() {
        let hasher = Argon2Hasher::low_cost();
        let digest = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify("correct horse", &digest).unwrap());
        assert!(!hasher.verify("correct horse!", &digest).unwrap());
    }

    #[test]
    fn test_hash_is_phc_format_and_salted() {
        let hasher = Argon2Hasher::low_cost();
        let a = hasher.hash("secret").unwrap();
        let b = hasher.hash("secret").unwrap();

        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_digest_is_error() {
        let hasher = Argon2Hasher::low_cost();
        assert!(hasher.verify("secret", "not-a-hash").is_err());
    }
}
