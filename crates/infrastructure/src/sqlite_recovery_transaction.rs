//! SQLite-backed [`BackupCodeRecoveryTransaction`]: the storage-side half of
//! the §4.7 recovery sequence, spanning the `user`, `backup_code`, and
//! `session` tables in one write transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use shelfguard_application::BackupCodeRecoveryTransaction;
use shelfguard_core::AppResult;
use shelfguard_domain::{AuthType, BackupCodeId, UserId};

use crate::encrypted_store::EncryptedStore;

/// Implements the all-or-nothing rotation: the triggering backup code is
/// consumed, the new TOTP secret and backup codes are written, and every
/// session for the user is gone, all in one commit — or, if the code turns
/// out to already be used, none of it happens at all.
#[derive(Clone)]
pub struct SqliteRecoveryTransaction {
    store: EncryptedStore,
}

impl SqliteRecoveryTransaction {
    /// Creates a new transaction runner over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BackupCodeRecoveryTransaction for SqliteRecoveryTransaction {
    async fn consume_and_rotate(
        &self,
        user_id: UserId,
        consumed_code_id: BackupCodeId,
        new_totp_secret: Vec<u8>,
        new_backup_code_hashes: Vec<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<usize>> {
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;

                let consumed = tx.execute(
                    "UPDATE backup_code SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
                    params![now.to_rfc3339(), consumed_code_id.0],
                )?;
                if consumed == 0 {
                    // Dropping `tx` here rolls back; nothing else has been written.
                    return Ok(None);
                }

                let remaining_old_codes: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM backup_code WHERE user_id = ?1 AND used_at IS NULL",
                    params![user_id.value()],
                    |row| row.get(0),
                )?;

                tx.execute(
                    "UPDATE user SET auth_type = ?1, auth_credential = ?2 WHERE id = ?3",
                    params![AuthType::Totp.as_str(), new_totp_secret, user_id.value()],
                )?;

                tx.execute(
                    "DELETE FROM backup_code WHERE user_id = ?1 AND used_at IS NULL",
                    params![user_id.value()],
                )?;
                for hash in &new_backup_code_hashes {
                    tx.execute(
                        "INSERT INTO backup_code (user_id, code_hash) VALUES (?1, ?2)",
                        params![user_id.value(), hash],
                    )?;
                }

                tx.execute("DELETE FROM session WHERE user_id = ?1", params![user_id.value()])?;

                tx.commit()?;
                Ok(Some(remaining_old_codes as usize))
            })
            .await
    }
}
