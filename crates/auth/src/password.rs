//! Password hashing and verification using Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedDigest(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted, deliberately slow one-way password transform.
///
/// Equal plaintexts hash to different digests (a fresh random salt per call).
/// Digests are PHC strings, so verification reads the cost parameters from the
/// digest itself rather than from this instance.
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
    dummy_digest: String,
}

impl core::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    pub fn new(cost: HashingCost) -> Result<Self, PasswordError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_digest = argon2
            .hash_password(b"keystone-dummy-credential", &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();

        Ok(Self { argon2, dummy_digest })
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Returns `Ok(false)` on mismatch; `Err` only when `digest` is not a valid
    /// PHC string (configuration or data corruption).
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(digest).map_err(|e| PasswordError::MalformedDigest(e.to_string()))?;
        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedDigest(e.to_string())),
        }
    }

    /// Spend the same work as a real verification when there is no candidate
    /// digest, so unknown accounts are not distinguishable by timing.
    pub fn verify_against_dummy(&self, plaintext: &str) {
        let _ = self.verify(plaintext, &self.dummy_digest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialVerifier {
        CredentialVerifier::new(HashingCost {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn correct_password_matches() {
        let v = cheap();
        let digest = v.hash("hunter22").unwrap();
        assert!(v.verify("hunter22", &digest).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let v = cheap();
        let digest = v.hash("hunter22").unwrap();
        assert!(!v.verify("hunter23", &digest).unwrap());
    }

    #[test]
    fn equal_plaintexts_produce_different_digests() {
        let v = cheap();
        let a = v.hash("same-password").unwrap();
        let b = v.hash("same-password").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("same-password"));
    }

    #[test]
    fn digest_from_different_cost_still_verifies() {
        let digest = cheap().hash("portable").unwrap();
        let other = CredentialVerifier::new(HashingCost {
            memory_kib: 512,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(other.verify("portable", &digest).unwrap());
    }

    #[test]
    fn malformed_digest_is_an_error() {
        let result = cheap().verify("pw", "not-a-hash");
        assert!(matches!(result, Err(PasswordError::MalformedDigest(_))));
    }

    #[test]
    fn invalid_cost_is_rejected() {
        let result = CredentialVerifier::new(HashingCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(PasswordError::InvalidParams(_))));
    }
}
