use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::{AppError, AppResult};
use shelfguard_domain::{BACKUP_CODE_GROUPS, BACKUP_CODE_GROUP_LEN, BackupCode, BackupCodeId, N_BACKUP_CODES, UserId};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Per-code salted hashing (argon2id or an equivalent memory-hard KDF).
pub trait BackupCodeHasher: Send + Sync {
    /// Hashes a normalized backup code.
    fn hash_code(&self, code: &str) -> AppResult<String>;

    /// Verifies a normalized backup code against a stored hash.
    fn verify_code(&self, code: &str, hash: &str) -> AppResult<bool>;
}

/// Persistence port for [`BackupCode`] rows.
#[async_trait]
pub trait BackupCodeRepository: Send + Sync {
    /// Deletes all unused codes for `user_id` and inserts a fresh set of
    /// [`N_BACKUP_CODES`] hashes, atomically.
    async fn replace_active_codes(
        &self,
        user_id: UserId,
        hashes: Vec<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Returns every unconsumed code belonging to `user_id`.
    async fn active_codes(&self, user_id: UserId) -> AppResult<Vec<BackupCode>>;

    /// Atomically marks a code used, guarded by `used_at IS NULL`. Returns
    /// `true` exactly once per code, even under concurrent callers.
    async fn consume_if_unused(&self, code_id: BackupCodeId, now: DateTime<Utc>) -> AppResult<bool>;

    /// Number of unconsumed codes remaining for `user_id`.
    async fn remaining_count(&self, user_id: UserId) -> AppResult<usize>;
}

/// Generates, hashes, stores, and verify-and-consumes single-use recovery
/// codes.
#[derive(Clone)]
pub struct BackupCodeVault {
    repository: Arc<dyn BackupCodeRepository>,
    hasher: Arc<dyn BackupCodeHasher>,
}

impl BackupCodeVault {
    /// Creates a new vault.
    #[must_use]
    pub fn new(repository: Arc<dyn BackupCodeRepository>, hasher: Arc<dyn BackupCodeHasher>) -> Self {
        Self { repository, hasher }
    }

    /// Generates [`N_BACKUP_CODES`] fresh codes, replaces any unused codes
    /// for `user_id` with their hashes, and returns the plaintext set — the
    /// only time plaintext leaves the vault.
    pub async fn create_codes_for_user(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<Vec<String>> {
        let codes = generate_codes()?;
        let mut hashes = Vec::with_capacity(codes.len());
        for code in &codes {
            hashes.push(self.hasher.hash_code(&normalize(code))?);
        }
        self.repository.replace_active_codes(user_id, hashes, now).await?;
        Ok(codes)
    }

    /// Verifies `candidate` against `user_id`'s active codes and, on a
    /// match, atomically marks it used. Returns `true` exactly once per
    /// code across all concurrent callers.
    pub async fn verify_and_consume(
        &self,
        user_id: UserId,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self.verify_and_consume_with_id(user_id, candidate, now).await?.is_some())
    }

    /// As [`Self::verify_and_consume`], but on success also returns the id
    /// of the consumed code.
    pub async fn verify_and_consume_with_id(
        &self,
        user_id: UserId,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BackupCodeId>> {
        let normalized = normalize(candidate);
        let active = self.repository.active_codes(user_id).await?;

        for code in active {
            if self.hasher.verify_code(&normalized, &code.code_hash)? {
                if self.repository.consume_if_unused(code.id, now).await? {
                    return Ok(Some(code.id));
                }
                return Ok(None);
            }
        }

        Ok(None)
    }

    /// Finds the active code matching `candidate`, if any, without
    /// consuming it. Used by the recovery sequence, which folds the actual
    /// consumption into the same storage transaction as the TOTP/backup-code
    /// rotation, so the two can succeed or fail as one unit.
    pub async fn find_unused_matching_code(
        &self,
        user_id: UserId,
        candidate: &str,
    ) -> AppResult<Option<BackupCodeId>> {
        let normalized = normalize(candidate);
        let active = self.repository.active_codes(user_id).await?;

        for code in active {
            if self.hasher.verify_code(&normalized, &code.code_hash)? {
                return Ok(Some(code.id));
            }
        }

        Ok(None)
    }

    /// Generates [`N_BACKUP_CODES`] fresh codes and their hashes without
    /// persisting them — used by the recovery sequence, which must hash the
    /// replacement codes before entering its storage transaction.
    pub fn generate_hashed_codes(&self) -> AppResult<(Vec<String>, Vec<String>)> {
        let codes = generate_codes()?;
        let mut hashes = Vec::with_capacity(codes.len());
        for code in &codes {
            hashes.push(self.hasher.hash_code(&normalize(code))?);
        }
        Ok((codes, hashes))
    }

    /// Dummy comparison with the same cost profile as a real verification,
    /// for use on the decoy path when a username does not resolve to a
    /// user — so a timing oracle cannot distinguish the two cases.
    pub fn decoy_verify(&self) {
        const DECOY_HASH: &str =
            "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let _ = self.hasher.verify_code("DECOYDECOYDECOY", DECOY_HASH);
    }

    /// Number of unconsumed codes remaining for `user_id`.
    pub async fn remaining_count(&self, user_id: UserId) -> AppResult<usize> {
        self.repository.remaining_count(user_id).await
    }
}

/// Strips whitespace and hyphens and uppercases, so `abcd-1234-...` and
/// `ABCD1234...` compare equal.
fn normalize(candidate: &str) -> String {
    candidate
        .chars()
        .filter(|character| !character.is_whitespace() && *character != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

fn generate_codes() -> AppResult<Vec<String>> {
    (0..N_BACKUP_CODES).map(|_| generate_one_code()).collect()
}

fn generate_one_code() -> AppResult<String> {
    let raw_len = BACKUP_CODE_GROUPS * BACKUP_CODE_GROUP_LEN;
    let mut indices = vec![0_u8; raw_len];
    getrandom::fill(&mut indices)
        .map_err(|error| AppError::Store(format!("failed to generate backup code: {error}")))?;

    let raw: String = indices
        .iter()
        .map(|byte| CODE_ALPHABET[(*byte as usize) % CODE_ALPHABET.len()] as char)
        .collect();

    let grouped = raw
        .as_bytes()
        .chunks(BACKUP_CODE_GROUP_LEN)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-");

    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_has_display_shape() {
        let code = generate_one_code().unwrap_or_else(|_| unreachable!());
        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), BACKUP_CODE_GROUPS);
        assert!(groups.iter().all(|group| group.len() == BACKUP_CODE_GROUP_LEN));
    }

    #[test]
    fn normalize_strips_hyphens_whitespace_and_cases() {
        assert_eq!(normalize(" abcd-1234-efgh-5678 "), "ABCD1234EFGH5678");
    }
}
