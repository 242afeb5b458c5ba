//! SQLite-backed [`PendingRegistrationRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use shelfguard_application::PendingRegistrationRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{PendingRegistration, PendingRegistrationId};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::parse_timestamp;

/// [`PendingRegistrationRepository`] backed by the `pending_registration`
/// table.
#[derive(Clone)]
pub struct SqlitePendingRegistrationRepository {
    store: EncryptedStore,
}

impl SqlitePendingRegistrationRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn row_to_pending(row: &Row<'_>) -> rusqlite::Result<PendingRegistration> {
    let created_at: String = row.get("created_at")?;
    let expires_at: String = row.get("expires_at")?;
    Ok(PendingRegistration {
        id: PendingRegistrationId(row.get("id")?),
        username: row.get("username")?,
        token_hash: row.get("token_hash")?,
        created_at: parse_timestamp(&created_at),
        expires_at: parse_timestamp(&expires_at),
    })
}

#[async_trait]
impl PendingRegistrationRepository for SqlitePendingRegistrationRepository {
    async fn create(
        &self,
        username: &str,
        token_hash: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<PendingRegistration> {
        let username = username.to_owned();
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                // Invariant P1: at most one pending registration per username.
                tx.execute(
                    "DELETE FROM pending_registration WHERE username = ?1",
                    params![username],
                )?;
                tx.execute(
                    "INSERT INTO pending_registration (username, token_hash, created_at, expires_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![username, token_hash, created_at.to_rfc3339(), expires_at.to_rfc3339()],
                )?;
                let id = tx.last_insert_rowid();
                let pending = tx.query_row(
                    "SELECT * FROM pending_registration WHERE id = ?1",
                    params![id],
                    row_to_pending,
                )?;
                tx.commit()?;
                Ok(pending)
            })
            .await
    }

    async fn consume_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingRegistration>> {
        let token_hash = token_hash.to_owned();
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let pending = tx
                    .query_row(
                        "SELECT * FROM pending_registration WHERE token_hash = ?1 AND expires_at > ?2",
                        params![token_hash, now.to_rfc3339()],
                        row_to_pending,
                    )
                    .optional()?;
                if let Some(pending) = &pending {
                    // Delete unconditionally (even past expiry) so a
                    // subsequent lookup never observes the row again.
                    tx.execute(
                        "DELETE FROM pending_registration WHERE id = ?1",
                        params![pending.id.0],
                    )?;
                }
                tx.execute(
                    "DELETE FROM pending_registration WHERE token_hash = ?1 AND expires_at <= ?2",
                    params![token_hash, now.to_rfc3339()],
                )?;
                tx.commit()?;
                Ok(pending)
            })
            .await
    }
}
