//! SQLite-backed [`WebAuthnCredentialRepository`].

use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row, params};
use shelfguard_application::WebAuthnCredentialRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{UserId, WebAuthnCredential, WebAuthnCredentialId};

use crate::encrypted_store::EncryptedStore;

/// [`WebAuthnCredentialRepository`] backed by the `webauthn_credential` table.
#[derive(Clone)]
pub struct SqliteWebAuthnCredentialRepository {
    store: EncryptedStore,
}

impl SqliteWebAuthnCredentialRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<WebAuthnCredential> {
    let sign_count: i64 = row.get("sign_count")?;
    Ok(WebAuthnCredential {
        id: WebAuthnCredentialId(row.get("id")?),
        user_id: UserId(row.get("user_id")?),
        credential_id: row.get("credential_id")?,
        public_key: row.get("public_key")?,
        sign_count: sign_count as u32,
        revoked: row.get("revoked")?,
    })
}

#[async_trait]
impl WebAuthnCredentialRepository for SqliteWebAuthnCredentialRepository {
    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<WebAuthnCredential>> {
        self.store
            .interact(move |conn| {
                let mut statement = conn.prepare(
                    "SELECT * FROM webauthn_credential WHERE user_id = ?1 AND revoked = 0",
                )?;
                let rows = statement
                    .query_map(params![user_id.value()], row_to_credential)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    async fn insert(&self, user_id: UserId, credential_id: Vec<u8>, public_key: Vec<u8>) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute(
                    "INSERT INTO webauthn_credential (user_id, credential_id, public_key, sign_count, revoked) \
                     VALUES (?1, ?2, ?3, 0, 0)",
                    params![user_id.value(), credential_id, public_key],
                )?;
                Ok(())
            })
            .await
    }

    async fn find_by_credential_id(&self, credential_id: &[u8]) -> AppResult<Option<WebAuthnCredential>> {
        let credential_id = credential_id.to_vec();
        self.store
            .interact(move |conn| {
                conn.query_row(
                    "SELECT * FROM webauthn_credential WHERE credential_id = ?1",
                    params![credential_id],
                    row_to_credential,
                )
                .optional()
            })
            .await
    }

    async fn advance_sign_count_if_greater(
        &self,
        credential_id: WebAuthnCredentialId,
        new_count: u32,
    ) -> AppResult<bool> {
        self.store
            .interact(move |conn| {
                let updated = conn.execute(
                    "UPDATE webauthn_credential SET sign_count = ?1 WHERE id = ?2 AND sign_count < ?1",
                    params![new_count, credential_id.0],
                )?;
                Ok(updated == 1)
            })
            .await
    }

    async fn revoke(&self, credential_id: WebAuthnCredentialId) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute(
                    "UPDATE webauthn_credential SET revoked = 1 WHERE id = ?1",
                    params![credential_id.0],
                )?;
                Ok(())
            })
            .await
    }
}
