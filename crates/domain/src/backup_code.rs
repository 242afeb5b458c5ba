use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Number of active backup codes maintained per user.
pub const N_BACKUP_CODES: usize = 8;
/// Number of `XXXX` groups in a displayed backup code.
pub const BACKUP_CODE_GROUPS: usize = 4;
/// Length of each group in a displayed backup code.
pub const BACKUP_CODE_GROUP_LEN: usize = 4;

/// Surrogate identifier for a [`BackupCode`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCodeId(pub i64);

/// A single-use recovery code.
///
/// *Invariant B1:* each code verifies against at most one user and is
/// consumable at most once. Only the salted hash is stored; the plaintext
/// code is returned to the caller exactly once, at generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCode {
    /// Surrogate primary key.
    pub id: BackupCodeId,
    /// The user this code belongs to.
    pub user_id: UserId,
    /// Argon2id (or equivalent memory-hard KDF) hash of the code.
    pub code_hash: String,
    /// When the code was consumed, if ever.
    pub used_at: Option<DateTime<Utc>>,
}

impl BackupCode {
    /// Whether this code is still available to consume.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.used_at.is_none()
    }
}
