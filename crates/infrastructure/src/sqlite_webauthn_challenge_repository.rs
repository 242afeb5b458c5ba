//! SQLite-backed [`WebAuthnChallengeRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use shelfguard_application::WebAuthnChallengeRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{UserId, WebAuthnCeremonyPurpose, WebAuthnChallenge};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::{parse_timestamp, parse_timestamp_opt};

/// [`WebAuthnChallengeRepository`] backed by the `webauthn_challenge` table.
#[derive(Clone)]
pub struct SqliteWebAuthnChallengeRepository {
    store: EncryptedStore,
}

impl SqliteWebAuthnChallengeRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn purpose_text(purpose: WebAuthnCeremonyPurpose) -> &'static str {
    match purpose {
        WebAuthnCeremonyPurpose::Register => "register",
        WebAuthnCeremonyPurpose::Authenticate => "authenticate",
    }
}

fn parse_purpose(raw: &str) -> WebAuthnCeremonyPurpose {
    if raw == "authenticate" {
        WebAuthnCeremonyPurpose::Authenticate
    } else {
        WebAuthnCeremonyPurpose::Register
    }
}

fn row_to_challenge(row: &Row<'_>) -> rusqlite::Result<WebAuthnChallenge> {
    let user_id: Option<i64> = row.get("user_id")?;
    let purpose: String = row.get("purpose")?;
    let created_at: String = row.get("created_at")?;
    let expires_at: String = row.get("expires_at")?;
    let used_at: Option<String> = row.get("used_at")?;

    Ok(WebAuthnChallenge {
        token_hash: row.get("token_hash")?,
        user_id: user_id.map(UserId),
        purpose: parse_purpose(&purpose),
        state_blob: row.get("state_blob")?,
        created_at: parse_timestamp(&created_at),
        expires_at: parse_timestamp(&expires_at),
        used_at: parse_timestamp_opt(used_at.as_deref()),
    })
}

#[async_trait]
impl WebAuthnChallengeRepository for SqliteWebAuthnChallengeRepository {
    async fn create(
        &self,
        user_id: Option<UserId>,
        purpose: WebAuthnCeremonyPurpose,
        token_hash: String,
        state_blob: Vec<u8>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<WebAuthnChallenge> {
        self.store
            .interact({
                let token_hash = token_hash.clone();
                move |conn| {
                    conn.execute(
                        "INSERT INTO webauthn_challenge \
                         (token_hash, user_id, purpose, state_blob, created_at, expires_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            token_hash,
                            user_id.map(UserId::value),
                            purpose_text(purpose),
                            state_blob,
                            created_at.to_rfc3339(),
                            expires_at.to_rfc3339(),
                        ],
                    )?;
                    conn.query_row(
                        "SELECT * FROM webauthn_challenge WHERE token_hash = ?1",
                        params![token_hash],
                        row_to_challenge,
                    )
                }
            })
            .await
    }

    async fn consume_valid(
        &self,
        token_hash: &str,
        purpose: WebAuthnCeremonyPurpose,
        now: DateTime<Utc>,
    ) -> AppResult<Option<WebAuthnChallenge>> {
        let token_hash = token_hash.to_owned();
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let updated = tx.execute(
                    "UPDATE webauthn_challenge SET used_at = ?1 \
                     WHERE token_hash = ?2 AND purpose = ?3 AND used_at IS NULL AND expires_at > ?1",
                    params![now.to_rfc3339(), token_hash, purpose_text(purpose)],
                )?;
                let challenge = if updated == 1 {
                    tx.query_row(
                        "SELECT * FROM webauthn_challenge WHERE token_hash = ?1",
                        params![token_hash],
                        row_to_challenge,
                    )
                    .optional()?
                } else {
                    None
                };
                tx.commit()?;
                Ok(challenge)
            })
            .await
    }
}
