//! SQLite-backed [`UserRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use shelfguard_application::UserRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{AuthType, User, UserId, Username};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::{parse_timestamp, parse_timestamp_opt};

/// [`UserRepository`] backed by the `user` table.
#[derive(Clone)]
pub struct SqliteUserRepository {
    store: EncryptedStore,
}

impl SqliteUserRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let auth_type_text: String = row.get("auth_type")?;
    let auth_type = match auth_type_text.as_str() {
        "webauthn" => AuthType::Webauthn,
        _ => AuthType::Totp,
    };
    let created_at: String = row.get("created_at")?;
    let last_login: Option<String> = row.get("last_login")?;

    Ok(User {
        id: UserId(row.get("id")?),
        username: Username::parse(row.get::<_, String>("username")?).unwrap_or_else(|_| {
            Username::parse("invalid").unwrap_or_else(|_| unreachable!())
        }),
        auth_type,
        auth_credential: row.get("auth_credential")?,
        can_download: row.get("can_download")?,
        is_admin: row.get("is_admin")?,
        recovery_email: row.get("recovery_email")?,
        recovery_phone: row.get("recovery_phone")?,
        created_at: parse_timestamp(&created_at),
        last_login: parse_timestamp_opt(last_login.as_deref()),
    })
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_username(&self, username: &Username) -> AppResult<Option<User>> {
        let username = username.as_str().to_owned();
        self.store
            .interact(move |conn| {
                conn.query_row("SELECT * FROM user WHERE username = ?1", params![username], row_to_user)
                    .optional()
            })
            .await
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
        self.store
            .interact(move |conn| {
                conn.query_row("SELECT * FROM user WHERE id = ?1", params![user_id.value()], row_to_user)
                    .optional()
            })
            .await
    }

    async fn username_exists(&self, username: &Username) -> AppResult<bool> {
        let username = username.as_str().to_owned();
        self.store
            .interact(move |conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM user WHERE username = ?1)",
                    params![username],
                    |row| row.get(0),
                )
            })
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        username: &Username,
        auth_type: AuthType,
        auth_credential: Vec<u8>,
        recovery_email: Option<String>,
        recovery_phone: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let username = username.as_str().to_owned();
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let inserted = tx.execute(
                    "INSERT INTO user (username, auth_type, auth_credential, can_download, is_admin, \
                         recovery_email, recovery_phone, created_at) \
                     SELECT ?1, ?2, ?3, 0, 0, ?4, ?5, ?6 \
                     WHERE NOT EXISTS (SELECT 1 FROM user WHERE username = ?1)",
                    params![
                        username,
                        auth_type.as_str(),
                        auth_credential,
                        recovery_email,
                        recovery_phone,
                        now.to_rfc3339(),
                    ],
                )?;

                if inserted == 0 {
                    tx.commit()?;
                    return Ok(None);
                }

                let id = tx.last_insert_rowid();
                let user = tx.query_row("SELECT * FROM user WHERE id = ?1", params![id], row_to_user)?;
                tx.commit()?;
                Ok(Some(user))
            })
            .await
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        let user = user.clone();
        self.store
            .interact(move |conn| {
                conn.execute(
                    "INSERT INTO user (id, username, auth_type, auth_credential, can_download, is_admin, \
                         recovery_email, recovery_phone, created_at, last_login) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(id) DO UPDATE SET \
                         username = excluded.username, \
                         auth_type = excluded.auth_type, \
                         auth_credential = excluded.auth_credential, \
                         can_download = excluded.can_download, \
                         is_admin = excluded.is_admin, \
                         recovery_email = excluded.recovery_email, \
                         recovery_phone = excluded.recovery_phone, \
                         last_login = excluded.last_login",
                    params![
                        user.id.value(),
                        user.username.as_str(),
                        user.auth_type.as_str(),
                        user.auth_credential,
                        user.can_download,
                        user.is_admin,
                        user.recovery_email,
                        user.recovery_phone,
                        user.created_at.to_rfc3339(),
                        user.last_login.map(|timestamp| timestamp.to_rfc3339()),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn update_last_login(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute(
                    "UPDATE user SET last_login = ?1 WHERE id = ?2",
                    params![now.to_rfc3339(), user_id.value()],
                )?;
                Ok(())
            })
            .await
    }
}
