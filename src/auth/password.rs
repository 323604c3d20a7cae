//! Password hashing and verification
//!
//! Passwords are hashed with Argon2id into PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`). The digest carries its own
//! salt and cost parameters, so verification never needs the hasher's current
//! configuration and stored hashes survive a later increase in cost.

use argon2::{
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

use crate::config::PasswordConfig;
use crate::error::HashError;

/// Argon2id password hasher with configurable cost
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("memory_kib", &self.params.m_cost())
            .field("iterations", &self.params.t_cost())
            .field("parallelism", &self.params.p_cost())
            .finish()
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialHasher {
    /// Create a hasher with explicit Argon2 cost parameters
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    /// Create a hasher from the `password` configuration section
    pub fn from_config(config: &PasswordConfig) -> Result<Self, HashError> {
        Self::new(config.memory_kib, config.iterations, config.parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password
    ///
    /// A fresh random salt is drawn for every call, so hashing the same
    /// password twice yields two different digests.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::HashFailed`] only if Argon2 itself fails; any
    /// byte sequence is accepted as input.
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::HashFailed(e.to_string()))
    }

    /// Verify a plaintext password against a stored digest
    ///
    /// Returns `Ok(false)` on mismatch. Cost parameters are read from the
    /// digest, not from this hasher.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::MalformedDigest`] if `digest` is not a valid PHC
    /// string.
    pub fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(digest)
            .map_err(|e| HashError::MalformedDigest(e.to_string()))?;

        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(e) => Err(HashError::MalformedDigest(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum Argon2 cost keeps the tests fast
    fn cheap_hasher() -> CredentialHasher {
        CredentialHasher::new(8, 1, 1).unwrap()
    }

    // Test 1: hash produces an argon2id PHC string
    #[test]
    fn test_hash_is_argon2id() {
        let hash = cheap_hasher().hash("password123").unwrap();
        assert!(
            hash.starts_with("$argon2id$"),
            "Hash should be in Argon2id format"
        );
    }

    // Test 2: hash embeds its own cost parameters
    #[test]
    fn test_hash_embeds_params() {
        let hash = cheap_hasher().hash("password123").unwrap();
        assert!(hash.contains("m=8,t=1,p=1"), "got {}", hash);
    }

    // Test 3: verify succeeds for the right password
    #[test]
    fn test_verify_success() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("password123").unwrap();
        assert!(hasher.verify(&hash, "password123").unwrap());
    }

    // Test 4: verify fails (without error) for the wrong password
    #[test]
    fn test_verify_wrong_password() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("password123").unwrap();
        assert!(!hasher.verify(&hash, "password124").unwrap());
        assert!(!hasher.verify(&hash, "").unwrap());
    }

    // Test 5: same password hashed twice gives different digests
    #[test]
    fn test_hash_unique_salts() {
        let hasher = cheap_hasher();
        let hash1 = hasher.hash("password123").unwrap();
        let hash2 = hasher.hash("password123").unwrap();

        assert_ne!(
            hash1, hash2,
            "Same password should produce different hashes due to different salts"
        );
        assert!(hasher.verify(&hash1, "password123").unwrap());
        assert!(hasher.verify(&hash2, "password123").unwrap());
    }

    // Test 6: malformed digest is an error, not a mismatch
    #[test]
    fn test_verify_malformed_digest() {
        let result = cheap_hasher().verify("not_a_valid_hash", "password123");
        assert!(matches!(result, Err(HashError::MalformedDigest(_))));
    }

    // Test 7: raising the cost does not invalidate older hashes
    #[test]
    fn test_verify_after_cost_increase() {
        let old = cheap_hasher().hash("password123").unwrap();
        let stronger = CredentialHasher::new(16, 2, 1).unwrap();

        assert!(stronger.verify(&old, "password123").unwrap());
        assert!(stronger.hash("password123").unwrap().contains("m=16,t=2,p=1"));
    }

    // Test 8: arbitrary input content is accepted
    #[test]
    fn test_hash_accepts_any_content() {
        let hasher = cheap_hasher();
        for input in ["", "ünïcødé pässwörd 🔑", "a\0b", &"x".repeat(1024)] {
            let hash = hasher.hash(input).unwrap();
            assert!(hasher.verify(&hash, input).unwrap());
        }
    }

    // Test 9: out-of-range parameters are rejected
    #[test]
    fn test_invalid_params() {
        let result = CredentialHasher::new(1, 0, 1);
        assert!(matches!(result, Err(HashError::InvalidParams(_))));
    }
}
