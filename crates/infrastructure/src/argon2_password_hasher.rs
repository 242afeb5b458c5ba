//! Argon2id backup-code hasher.
//!
//! Uses OWASP-recommended parameters: m=19456 (19 MiB), t=2, p=1. These are
//! stored inside the PHC-formatted hash string itself, so strengthening the
//! parameters later does not require a one-time migration of existing rows.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use shelfguard_application::BackupCodeHasher;
use shelfguard_core::{AppError, AppResult};

/// Argon2id backup-code hasher with OWASP-recommended parameters.
#[derive(Clone)]
pub struct Argon2BackupCodeHasher {
    argon2: Argon2<'static>,
}

impl Argon2BackupCodeHasher {
    /// Creates a new hasher with `m=19456, t=2, p=1`.
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(19456, 2, 1, None).unwrap_or_else(|_| Params::default());
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2BackupCodeHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupCodeHasher for Argon2BackupCodeHasher {
    fn hash_code(&self, code: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = self
            .argon2
            .hash_password(code.as_bytes(), &salt)
            .map_err(|error| AppError::Store(format!("failed to hash backup code: {error}")))?;
        Ok(hash.to_string())
    }

    fn verify_code(&self, code: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(false),
        };

        match self.argon2.verify_password(code.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => Err(AppError::Store(format!("backup code verification failed: {error}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_correct_code() {
        let hasher = Argon2BackupCodeHasher::new();
        let hash = hasher.hash_code("ABCD1234EFGH5678").unwrap_or_else(|_| unreachable!());
        assert!(hasher.verify_code("ABCD1234EFGH5678", &hash).unwrap_or(false));
    }

    #[test]
    fn verify_wrong_code_returns_false() {
        let hasher = Argon2BackupCodeHasher::new();
        let hash = hasher.hash_code("ABCD1234EFGH5678").unwrap_or_else(|_| unreachable!());
        assert!(!hasher.verify_code("WRONGWRONGWRONG1", &hash).unwrap_or(true));
    }

    #[test]
    fn verify_garbage_hash_returns_false_not_error() {
        let hasher = Argon2BackupCodeHasher::new();
        assert!(!hasher.verify_code("ABCD1234EFGH5678", "not-a-phc-hash").unwrap_or(true));
    }
}
