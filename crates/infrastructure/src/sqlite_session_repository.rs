//! SQLite-backed [`SessionRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use shelfguard_application::SessionRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{Session, SessionId, UserId};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::parse_timestamp;

/// [`SessionRepository`] backed by the `session` table.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    store: EncryptedStore,
}

impl SqliteSessionRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let created_at: String = row.get("created_at")?;
    let last_seen: String = row.get("last_seen")?;
    Ok(Session {
        id: SessionId(row.get("id")?),
        user_id: UserId(row.get("user_id")?),
        user_agent: row.get("user_agent")?,
        ip_address: row.get("ip_address")?,
        created_at: parse_timestamp(&created_at),
        last_seen: parse_timestamp(&last_seen),
    })
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create_for_user(
        &self,
        user_id: UserId,
        token_hash: String,
        user_agent: Option<String>,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                // Invariant S1: a new session supersedes every prior session
                // for this user, inside the same transaction as creation.
                tx.execute("DELETE FROM session WHERE user_id = ?1", params![user_id.value()])?;
                tx.execute(
                    "INSERT INTO session (user_id, token_hash, user_agent, ip_address, created_at, last_seen) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![user_id.value(), token_hash, user_agent, ip_address, now.to_rfc3339()],
                )?;
                let id = tx.last_insert_rowid();
                let session = tx.query_row("SELECT * FROM session WHERE id = ?1", params![id], row_to_session)?;
                tx.commit()?;
                Ok(session)
            })
            .await
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let token_hash = token_hash.to_owned();
        self.store
            .interact(move |conn| {
                conn.query_row(
                    "SELECT * FROM session WHERE token_hash = ?1",
                    params![token_hash],
                    row_to_session,
                )
                .optional()
            })
            .await
    }

    async fn touch(&self, session_id: SessionId, now: DateTime<Utc>) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute(
                    "UPDATE session SET last_seen = ?1 WHERE id = ?2",
                    params![now.to_rfc3339(), session_id.0],
                )?;
                Ok(())
            })
            .await
    }

    async fn invalidate(&self, session_id: SessionId) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute("DELETE FROM session WHERE id = ?1", params![session_id.0])?;
                Ok(())
            })
            .await
    }

    async fn invalidate_user_sessions(&self, user_id: UserId) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute("DELETE FROM session WHERE user_id = ?1", params![user_id.value()])?;
                Ok(())
            })
            .await
    }

    async fn reap_stale(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        self.store
            .interact(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM session WHERE last_seen < ?1",
                    params![older_than.to_rfc3339()],
                )?;
                Ok(deleted as u64)
            })
            .await
    }
}
