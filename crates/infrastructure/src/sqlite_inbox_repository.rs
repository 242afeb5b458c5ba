//! SQLite-backed [`InboxRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use shelfguard_application::InboxRepository;
use shelfguard_core::AppResult;
use shelfguard_domain::{InboxMessage, InboxMessageId, InboxStatus, ReplyMethod, UserId};

use crate::encrypted_store::EncryptedStore;
use crate::rfc3339::{parse_timestamp, parse_timestamp_opt};

/// [`InboxRepository`] backed by the `inbox_message` and `contact_log`
/// tables.
#[derive(Clone)]
pub struct SqliteInboxRepository {
    store: EncryptedStore,
}

impl SqliteInboxRepository {
    /// Creates a new repository over `store`.
    #[must_use]
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }
}

fn reply_via_text(reply_via: ReplyMethod) -> &'static str {
    match reply_via {
        ReplyMethod::InApp => "IN_APP",
        ReplyMethod::Email => "EMAIL",
    }
}

fn status_text(status: InboxStatus) -> &'static str {
    match status {
        InboxStatus::Unread => "UNREAD",
        InboxStatus::Read => "READ",
        InboxStatus::Replied => "REPLIED",
        InboxStatus::Archived => "ARCHIVED",
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<InboxMessage> {
    let reply_via: String = row.get("reply_via")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let read_at: Option<String> = row.get("read_at")?;
    let replied_at: Option<String> = row.get("replied_at")?;

    Ok(InboxMessage {
        id: InboxMessageId(row.get("id")?),
        from_user_id: UserId(row.get("from_user_id")?),
        message: row.get("message")?,
        reply_via: if reply_via == "EMAIL" { ReplyMethod::Email } else { ReplyMethod::InApp },
        reply_email: row.get("reply_email")?,
        status: match status.as_str() {
            "READ" => InboxStatus::Read,
            "REPLIED" => InboxStatus::Replied,
            "ARCHIVED" => InboxStatus::Archived,
            _ => InboxStatus::Unread,
        },
        created_at: parse_timestamp(&created_at),
        read_at: parse_timestamp_opt(read_at.as_deref()),
        replied_at: parse_timestamp_opt(replied_at.as_deref()),
    })
}

#[async_trait]
impl InboxRepository for SqliteInboxRepository {
    async fn create(
        &self,
        from_user_id: UserId,
        message: &str,
        reply_via: ReplyMethod,
        reply_email: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<InboxMessage> {
        let message = message.to_owned();
        let reply_email = reply_email.map(str::to_owned);
        self.store
            .interact(move |conn| {
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "INSERT INTO inbox_message (from_user_id, message, reply_via, reply_email, status, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        from_user_id.value(),
                        message,
                        reply_via_text(reply_via),
                        reply_email,
                        status_text(InboxStatus::Unread),
                        now.to_rfc3339(),
                    ],
                )?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO contact_log (user_id, created_at) VALUES (?1, ?2)",
                    params![from_user_id.value(), now.to_rfc3339()],
                )?;
                let created = tx.query_row(
                    "SELECT * FROM inbox_message WHERE id = ?1",
                    params![id],
                    row_to_message,
                )?;
                tx.commit()?;
                Ok(created)
            })
            .await
    }

    async fn find_by_id(&self, id: InboxMessageId) -> AppResult<Option<InboxMessage>> {
        self.store
            .interact(move |conn| {
                conn.query_row(
                    "SELECT * FROM inbox_message WHERE id = ?1",
                    params![id.0],
                    row_to_message,
                )
                .optional()
            })
            .await
    }

    async fn mark_read(&self, id: InboxMessageId, now: DateTime<Utc>) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute(
                    "UPDATE inbox_message SET status = ?1, read_at = COALESCE(read_at, ?2) \
                     WHERE id = ?3 AND status = 'UNREAD'",
                    params![status_text(InboxStatus::Read), now.to_rfc3339(), id.0],
                )?;
                Ok(())
            })
            .await
    }

    async fn mark_replied(&self, id: InboxMessageId, now: DateTime<Utc>) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                // Invariant I1: status and reply_email clear atomically.
                conn.execute(
                    "UPDATE inbox_message SET status = ?1, reply_email = NULL, replied_at = ?2 WHERE id = ?3",
                    params![status_text(InboxStatus::Replied), now.to_rfc3339(), id.0],
                )?;
                Ok(())
            })
            .await
    }

    async fn archive(&self, id: InboxMessageId) -> AppResult<()> {
        self.store
            .interact(move |conn| {
                conn.execute(
                    "UPDATE inbox_message SET status = ?1 WHERE id = ?2",
                    params![status_text(InboxStatus::Archived), id.0],
                )?;
                Ok(())
            })
            .await
    }

    async fn contact_count_since(&self, user_id: UserId, since: DateTime<Utc>) -> AppResult<u32> {
        self.store
            .interact(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM contact_log WHERE user_id = ?1 AND created_at >= ?2",
                    params![user_id.value(), since.to_rfc3339()],
                    |row| row.get(0),
                )?;
                Ok(count as u32)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    async fn store_with_user() -> (EncryptedStore, UserId) {
        let store = EncryptedStore::open_in_memory().await.unwrap_or_else(|_| unreachable!());
        let id = store
            .interact(|conn| {
                conn.execute(
                    "INSERT INTO user (username, auth_type, auth_credential, can_download, is_admin, created_at) \
                     VALUES ('sender01', 'TOTP', x'00', 0, 0, '2024-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap_or_else(|_| unreachable!());
        (store, UserId(id))
    }

    #[tokio::test]
    async fn mark_replied_clears_the_reply_email_atomically() {
        let (store, user_id) = store_with_user().await;
        let repository = SqliteInboxRepository::new(store);
        let now = Utc::now();

        let message = repository
            .create(user_id, "hello", ReplyMethod::Email, Some("sender@example.com"), now)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(message.reply_email.as_deref(), Some("sender@example.com"));

        repository.mark_replied(message.id, now).await.unwrap_or_else(|_| unreachable!());

        let reloaded = repository
            .find_by_id(message.id)
            .await
            .unwrap_or_else(|_| unreachable!())
            .unwrap_or_else(|| unreachable!());
        assert_eq!(reloaded.status, InboxStatus::Replied);
        assert!(reloaded.reply_email.is_none());
    }

    #[tokio::test]
    async fn mark_read_only_advances_an_unread_message() {
        let (store, user_id) = store_with_user().await;
        let repository = SqliteInboxRepository::new(store);
        let now = Utc::now();

        let message = repository
            .create(user_id, "hi", ReplyMethod::InApp, None, now)
            .await
            .unwrap_or_else(|_| unreachable!());

        repository.mark_read(message.id, now).await.unwrap_or_else(|_| unreachable!());
        let reloaded = repository
            .find_by_id(message.id)
            .await
            .unwrap_or_else(|_| unreachable!())
            .unwrap_or_else(|| unreachable!());
        assert_eq!(reloaded.status, InboxStatus::Read);
        assert!(reloaded.read_at.is_some());
    }

    #[tokio::test]
    async fn contact_count_since_counts_only_recent_messages() {
        let (store, user_id) = store_with_user().await;
        let repository = SqliteInboxRepository::new(store);
        let now = Utc::now();

        repository.create(user_id, "a", ReplyMethod::InApp, None, now).await.unwrap_or_else(|_| unreachable!());

        let count = repository
            .contact_count_since(user_id, now - chrono::Duration::minutes(1))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(count, 1);

        let count = repository
            .contact_count_since(user_id, now + chrono::Duration::minutes(1))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(count, 0);
    }
}
