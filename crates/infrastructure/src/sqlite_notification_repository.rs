//! SQLite-backed [`NotificationRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use shelfguard_application::NotificationRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{Notification, NotificationId, UserId};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::parse_timestamp;

/// [`NotificationRepository`] backed by the `notification` and
/// `notification_dismissal` tables.
#[derive(Clone)]
pub struct SqliteNotificationRepository {
    store: EncryptedStore,
}

impl SqliteNotificationRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let user_id: Option<i64> = row.get("user_id")?;
    let created_at: String = row.get("created_at")?;
    Ok(Notification {
        id: NotificationId(row.get("id")?),
        user_id: user_id.map(UserId),
        message: row.get("message")?,
        notification_type: row.get("notification_type")?,
        priority: row.get("priority")?,
        dismissable: row.get("dismissable")?,
        created_at: parse_timestamp(&created_at),
    })
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn create(
        &self,
        user_id: Option<UserId>,
        message: &str,
        notification_type: &str,
        priority: i32,
        dismissable: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        let message = message.to_owned();
        let notification_type = notification_type.to_owned();
        self.store
            .interact(move |conn| {
                conn.execute(
                    "INSERT INTO notification (user_id, message, notification_type, priority, dismissable, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        user_id.map(UserId::value),
                        message,
                        notification_type,
                        priority,
                        dismissable,
                        now.to_rfc3339(),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                conn.query_row(
                    "SELECT * FROM notification WHERE id = ?1",
                    params![id],
                    row_to_notification,
                )
            })
            .await
    }

    async fn list_active_for_user(&self, user_id: UserId) -> AppResult<Vec<Notification>> {
        self.store
            .interact(move |conn| {
                let mut statement = conn.prepare(
                    "SELECT n.* FROM notification n \
                     WHERE (n.user_id = ?1 OR n.user_id IS NULL) \
                       AND NOT EXISTS ( \
                         SELECT 1 FROM notification_dismissal d \
                         WHERE d.notification_id = n.id AND d.user_id = ?1 \
                       ) \
                     ORDER BY n.priority DESC, n.created_at DESC",
                )?;
                let rows = statement
                    .query_map(params![user_id.value()], row_to_notification)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    async fn dismiss(&self, notification_id: NotificationId, user_id: UserId, now: DateTime<Utc>) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute(
                    "INSERT INTO notification_dismissal (notification_id, user_id, dismissed_at) \
                     VALUES (?1, ?2, ?3) \
                     ON CONFLICT(notification_id, user_id) DO NOTHING",
                    params![notification_id.0, user_id.value(), now.to_rfc3339()],
                )?;
                Ok(())
            })
            .await
    }
}
