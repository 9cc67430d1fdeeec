//! Password hashing.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;

const SALT_LENGTH: usize = 16;

/// Stored in place of a hash when hashing fails. Not a PHC string, so it
/// never verifies.
const UNUSABLE_HASH: &str = "!";

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with default parameters, stored as a PHC string
/// (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`).
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    fn try_hash(password: &str) -> Result<String, argon2::password_hash::Error> {
        let mut salt_bytes = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)?;

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> String {
        Self::try_hash(password).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            UNUSABLE_HASH.to_string()
        })
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("correct horse");
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("correct horse"));
        assert!(hasher.verify("correct horse", &hash));
        assert!(!hasher.verify("wrong horse", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = Argon2Hasher;
        assert_ne!(hasher.hash("secret"), hasher.hash("secret"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = Argon2Hasher;
        assert!(!hasher.verify("secret", "secret"));
        assert!(!hasher.verify("secret", UNUSABLE_HASH));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn test_legacy_digest_is_rejected() {
        let hasher = Argon2Hasher;
        let legacy = concat!(
            "sha256$0123456789abcdef$",
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
        assert!(!hasher.verify("secret", legacy));
    }
}
