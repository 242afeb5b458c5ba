//! SQLite-backed [`BackupCodeRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use shelfguard_application::BackupCodeRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{BackupCode, BackupCodeId, UserId};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::parse_timestamp_opt;

/// [`BackupCodeRepository`] backed by the `backup_code` table.
#[derive(Clone)]
pub struct SqliteBackupCodeRepository {
    store: EncryptedStore,
}

impl SqliteBackupCodeRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn row_to_code(row: &Row<'_>) -> rusqlite::Result<BackupCode> {
    let used_at: Option<String> = row.get("used_at")?;
    Ok(BackupCode {
        id: BackupCodeId(row.get("id")?),
        user_id: UserId(row.get("user_id")?),
        code_hash: row.get("code_hash")?,
        used_at: parse_timestamp_opt(used_at.as_deref()),
    })
}

#[async_trait]
impl BackupCodeRepository for SqliteBackupCodeRepository {
    async fn replace_active_codes(
        &self,
        user_id: UserId,
        hashes: Vec<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "DELETE FROM backup_code WHERE user_id = ?1 AND used_at IS NULL",
                    params![user_id.value()],
                )?;
                for hash in &hashes {
                    tx.execute(
                        "INSERT INTO backup_code (user_id, code_hash) VALUES (?1, ?2)",
                        params![user_id.value(), hash],
                    )?;
                }
                let _ = now;
                tx.commit()
            })
            .await
    }

    async fn active_codes(&self, user_id: UserId) -> AppResult<Vec<BackupCode>> {
        self.store
            .interact(move |conn| {
                let mut statement =
                    conn.prepare("SELECT * FROM backup_code WHERE user_id = ?1 AND used_at IS NULL")?;
                let rows = statement
                    .query_map(params![user_id.value()], row_to_code)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    async fn consume_if_unused(&self, code_id: BackupCodeId, now: DateTime<Utc>) -> AppResult<bool> {
        self.store
            .interact(move |conn| {
                let updated = conn.execute(
                    "UPDATE backup_code SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
                    params![now.to_rfc3339(), code_id.0],
                )?;
                Ok(updated == 1)
            })
            .await
    }

    async fn remaining_count(&self, user_id: UserId) -> AppResult<usize> {
        self.store
            .interact(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM backup_code WHERE user_id = ?1 AND used_at IS NULL",
                    params![user_id.value()],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
    }
}
