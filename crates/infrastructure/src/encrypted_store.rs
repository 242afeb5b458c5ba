//! At-rest-encrypted relational storage: key-material bootstrap, pooled
//! SQLCipher access, and schema migration.
//!
//! The database and its keyfile are sibling paths. The keyfile holds 32
//! random bytes, hex-encoded, written with owner-only permissions on first
//! run; every pooled connection re-applies `PRAGMA key` before any other
//! statement runs against it.

use std::fs;
use std::path::Path;

use deadpool_sqlite::{Config, Pool, Runtime};
use shelfguard_core::{AppError, AppResult};

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS meta (schema_version INTEGER NOT NULL)",
    "CREATE TABLE IF NOT EXISTS user (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        auth_type TEXT NOT NULL,
        auth_credential BLOB NOT NULL,
        can_download INTEGER NOT NULL DEFAULT 0,
        is_admin INTEGER NOT NULL DEFAULT 0,
        recovery_email TEXT,
        recovery_phone TEXT,
        created_at TEXT NOT NULL,
        last_login TEXT
    )",
    "CREATE TABLE IF NOT EXISTS session (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        user_agent TEXT,
        ip_address TEXT,
        created_at TEXT NOT NULL,
        last_seen TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_session_user ON session(user_id)",
    "CREATE TABLE IF NOT EXISTS pending_registration (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        token_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pending_recovery (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        expires_at TEXT NOT NULL,
        used_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS backup_code (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        code_hash TEXT NOT NULL,
        used_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_backup_code_user ON backup_code(user_id)",
    "CREATE TABLE IF NOT EXISTS webauthn_credential (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        credential_id BLOB NOT NULL UNIQUE,
        public_key BLOB NOT NULL,
        sign_count INTEGER NOT NULL DEFAULT 0,
        revoked INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS webauthn_challenge (
        token_hash TEXT PRIMARY KEY,
        user_id INTEGER REFERENCES user(id) ON DELETE CASCADE,
        purpose TEXT NOT NULL,
        state_blob BLOB NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        used_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS notification (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES user(id) ON DELETE CASCADE,
        message TEXT NOT NULL,
        notification_type TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0,
        dismissable INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS notification_dismissal (
        notification_id INTEGER NOT NULL REFERENCES notification(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        dismissed_at TEXT NOT NULL,
        PRIMARY KEY (notification_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS inbox_message (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        message TEXT NOT NULL,
        reply_via TEXT NOT NULL,
        reply_email TEXT,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        read_at TEXT,
        replied_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS contact_log (
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_contact_log_user ON contact_log(user_id)",
];

/// Current schema version. Bump alongside any migration appended to
/// [`SCHEMA_STATEMENTS`].
const SCHEMA_VERSION: i64 = 1;

/// Key-material bootstrap plus pooled, encrypted, migrated SQLite access.
///
/// SQLCipher requires `PRAGMA key` to be the first statement run on a raw
/// connection. Rather than hook into pool connection creation, every
/// operation re-applies it inside the same `interact` closure that does the
/// real work — re-keying an already-unlocked SQLCipher connection with its
/// own key is a cheap no-op, and this keeps connection setup in one place
/// instead of splitting it across pool configuration and query code.
#[derive(Clone)]
pub struct EncryptedStore {
    pool: Pool,
    key_hex: Option<String>,
}

/// Result of [`EncryptedStore::verify`]'s health check.
#[derive(Debug, Clone)]
pub struct StoreHealthReport {
    /// Whether a round-trip query against the store succeeded.
    pub reachable: bool,
    /// The schema version recorded in `meta`.
    pub schema_version: i64,
    /// Total number of registered users.
    pub user_count: i64,
    /// Error detail when `reachable` is `false`. Never carries secrets; safe
    /// to surface to a caller, unlike `AppError::Store`'s log-only detail.
    pub error: Option<String>,
}

impl EncryptedStore {
    /// Opens (bootstrapping if absent) an encrypted database at `db_path`,
    /// with its keyfile at `keyfile_path`, and runs pending migrations.
    pub async fn open(db_path: impl AsRef<Path>, keyfile_path: impl AsRef<Path>) -> AppResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let key_hex = load_or_create_keyfile(keyfile_path.as_ref())?;

        let pool = Config::new(&db_path)
            .create_pool(Runtime::Tokio1)
            .map_err(|error| AppError::Store(format!("failed to build store pool: {error}")))?;

        let store = Self {
            pool,
            key_hex: Some(key_hex),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory, unencrypted store for tests: no keyfile, no disk file,
    /// ephemeral for the pool's lifetime. A single connection is kept alive
    /// for the whole pool so SQLite's `:memory:` database is not discarded
    /// between calls.
    pub async fn open_in_memory() -> AppResult<Self> {
        let pool = Config::new(":memory:")
            .builder(Runtime::Tokio1)
            .map_err(|error| AppError::Store(format!("failed to configure store pool: {error}")))?
            .max_size(1)
            .build()
            .map_err(|error| AppError::Store(format!("failed to build store pool: {error}")))?;
        let store = Self { pool, key_hex: None };
        store.migrate().await?;
        Ok(store)
    }

    /// Runs `f` against a pooled, keyed connection. Every call re-applies
    /// `PRAGMA key` first when the store is encrypted; see the type-level
    /// doc comment for why.
    pub async fn interact<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|error| AppError::Store(format!("failed to acquire connection: {error}")))?;

        let key_hex = self.key_hex.clone();
        conn.interact(move |conn| {
            if let Some(key_hex) = &key_hex {
                conn.pragma_update(None, "key", format!("x'{key_hex}'"))?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            f(conn)
        })
        .await
        .map_err(|error| AppError::Store(format!("store task failed: {error}")))?
        .map_err(|error| AppError::Store(format!("store query failed: {error}")))
    }

    async fn migrate(&self) -> AppResult<()> {
        self.interact(|conn| {
            let tx = conn.unchecked_transaction()?;
            for statement in SCHEMA_STATEMENTS {
                tx.execute(statement, [])?;
            }
            let rows: i64 = tx.query_row("SELECT COUNT(*) FROM meta", [], |row| row.get(0))?;
            if rows == 0 {
                tx.execute("INSERT INTO meta (schema_version) VALUES (?1)", [SCHEMA_VERSION])?;
            } else {
                tx.execute("UPDATE meta SET schema_version = ?1", [SCHEMA_VERSION])?;
            }
            tx.commit()
        })
        .await
    }

    /// Round-trips a trivial query and reports the recorded schema version
    /// and user count. Exposed at `GET /health`. Never propagates an error:
    /// a failure is captured into the report as `reachable: false` with its
    /// detail, per the health contract.
    pub async fn verify(&self) -> AppResult<StoreHealthReport> {
        let outcome = self
            .interact(|conn| {
                let schema_version = conn.query_row("SELECT schema_version FROM meta", [], |row| row.get(0))?;
                let user_count = conn.query_row("SELECT COUNT(*) FROM user", [], |row| row.get(0))?;
                Ok((schema_version, user_count))
            })
            .await;

        Ok(match outcome {
            Ok((schema_version, user_count)) => StoreHealthReport {
                reachable: true,
                schema_version,
                user_count,
                error: None,
            },
            Err(AppError::Store(detail)) => StoreHealthReport {
                reachable: false,
                schema_version: 0,
                user_count: 0,
                error: Some(detail),
            },
            Err(other) => StoreHealthReport {
                reachable: false,
                schema_version: 0,
                user_count: 0,
                error: Some(other.to_string()),
            },
        })
    }
}

fn load_or_create_keyfile(path: &Path) -> AppResult<String> {
    if path.exists() {
        let contents = fs::read_to_string(path)
            .map_err(|error| AppError::Store(format!("failed to read keyfile: {error}")))?;
        return Ok(contents.trim().to_owned());
    }

    let mut key = [0_u8; 32];
    getrandom::fill(&mut key).map_err(|error| AppError::Store(format!("failed to generate key: {error}")))?;
    let key_hex = hex::encode(key);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| AppError::Store(format!("failed to create data directory: {error}")))?;
    }
    fs::write(path, &key_hex).map_err(|error| AppError::Store(format!("failed to write keyfile: {error}")))?;
    set_owner_only_permissions(path)?;

    Ok(key_hex)
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, permissions)
        .map_err(|error| AppError::Store(format!("failed to set keyfile permissions: {error}")))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> AppResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verify_reports_reachable_on_a_healthy_store() {
        let store = EncryptedStore::open_in_memory().await.unwrap_or_else(|_| unreachable!());
        let report = store.verify().await.unwrap_or_else(|_| unreachable!());
        assert!(report.reachable);
        assert_eq!(report.schema_version, SCHEMA_VERSION);
        assert_eq!(report.user_count, 0);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn verify_never_propagates_a_store_failure() {
        let store = EncryptedStore::open_in_memory().await.unwrap_or_else(|_| unreachable!());
        // Drop the pool's backing table so the health query itself fails,
        // without otherwise breaking the connection.
        store
            .interact(|conn| conn.execute("DROP TABLE meta", []))
            .await
            .unwrap_or_else(|_| unreachable!());

        let report = store.verify().await.unwrap_or_else(|_| unreachable!());
        assert!(!report.reachable);
        assert_eq!(report.schema_version, 0);
        assert_eq!(report.user_count, 0);
        assert!(report.error.is_some());
    }
}

