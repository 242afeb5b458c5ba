//! SQLite-backed [`PendingRecoveryRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use shelfguard_application::PendingRecoveryRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{PendingRecovery, PendingRecoveryId, UserId};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::{parse_timestamp, parse_timestamp_opt};

/// [`PendingRecoveryRepository`] backed by the `pending_recovery` table.
#[derive(Clone)]
pub struct SqlitePendingRecoveryRepository {
    store: EncryptedStore,
}

impl SqlitePendingRecoveryRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn row_to_pending(row: &Row<'_>) -> rusqlite::Result<PendingRecovery> {
    let expires_at: String = row.get("expires_at")?;
    let used_at: Option<String> = row.get("used_at")?;
    Ok(PendingRecovery {
        id: PendingRecoveryId(row.get("id")?),
        user_id: UserId(row.get("user_id")?),
        token_hash: row.get("token_hash")?,
        expires_at: parse_timestamp(&expires_at),
        used_at: parse_timestamp_opt(used_at.as_deref()),
    })
}

#[async_trait]
impl PendingRecoveryRepository for SqlitePendingRecoveryRepository {
    async fn create(
        &self,
        user_id: UserId,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> AppResult<PendingRecovery> {
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "DELETE FROM pending_recovery WHERE user_id = ?1",
                    params![user_id.value()],
                )?;
                tx.execute(
                    "INSERT INTO pending_recovery (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)",
                    params![user_id.value(), token_hash, expires_at.to_rfc3339()],
                )?;
                let id = tx.last_insert_rowid();
                let pending =
                    tx.query_row("SELECT * FROM pending_recovery WHERE id = ?1", params![id], row_to_pending)?;
                tx.commit()?;
                Ok(pending)
            })
            .await
    }

    async fn consume_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingRecovery>> {
        let token_hash = token_hash.to_owned();
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let updated = tx.execute(
                    "UPDATE pending_recovery SET used_at = ?1 \
                     WHERE token_hash = ?2 AND used_at IS NULL AND expires_at > ?1",
                    params![now.to_rfc3339(), token_hash],
                )?;
                let pending = if updated == 1 {
                    tx.query_row(
                        "SELECT * FROM pending_recovery WHERE token_hash = ?1",
                        params![token_hash],
                        row_to_pending,
                    )
                    .optional()?
                } else {
                    None
                };
                tx.commit()?;
                Ok(pending)
            })
            .await
    }
}
