use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::{AppError, AppResult};
use shelfguard_domain::{InboxMessage, InboxMessageId, ReplyMethod, UserId};

/// Persistence port for [`InboxMessage`]s and the parallel abuse-review log.
#[async_trait]
pub trait InboxRepository: Send + Sync {
    /// Creates a message and appends a `ContactLog` row for the sender in
    /// the same operation.
    async fn create(
        &self,
        from_user_id: UserId,
        message: &str,
        reply_via: ReplyMethod,
        reply_email: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<InboxMessage>;

    /// Fetches a message by id.
    async fn find_by_id(&self, id: InboxMessageId) -> AppResult<Option<InboxMessage>>;

    /// Marks a message read, setting `read_at` if unset.
    async fn mark_read(&self, id: InboxMessageId, now: DateTime<Utc>) -> AppResult<()>;

    /// Atomically transitions a message to `Replied` and clears
    /// `reply_email`, per invariant I1.
    async fn mark_replied(&self, id: InboxMessageId, now: DateTime<Utc>) -> AppResult<()>;

    /// Transitions a message to `Archived` without a reply.
    async fn archive(&self, id: InboxMessageId) -> AppResult<()>;

    /// How many messages `user_id` has sent within the lookback window
    /// starting at `since`, from the append-only `ContactLog`.
    async fn contact_count_since(&self, user_id: UserId, since: DateTime<Utc>) -> AppResult<u32>;
}

/// User-to-admin contact messages with a reply-address clearing guarantee.
#[derive(Clone)]
pub struct InboxService {
    repository: Arc<dyn InboxRepository>,
}

impl InboxService {
    /// Creates a new service over the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn InboxRepository>) -> Self {
        Self { repository }
    }

    /// Submits a new inbox message. Validates that an email reply method
    /// carries an address, per the `InboxMessage` field contract.
    pub async fn submit(
        &self,
        from_user_id: UserId,
        message: &str,
        reply_via: ReplyMethod,
        reply_email: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<InboxMessage> {
        if matches!(reply_via, ReplyMethod::Email) && reply_email.is_none_or(str::is_empty) {
            return Err(AppError::Input(
                "reply_email is required when reply_via is EMAIL".to_string(),
            ));
        }

        self.repository
            .create(from_user_id, message, reply_via, reply_email, now)
            .await
    }

    /// Marks a message read by an admin.
    pub async fn mark_read(&self, id: InboxMessageId, now: DateTime<Utc>) -> AppResult<()> {
        self.repository.mark_read(id, now).await
    }

    /// Marks a message replied to, clearing its reply address.
    pub async fn mark_replied(&self, id: InboxMessageId, now: DateTime<Utc>) -> AppResult<()> {
        self.repository.mark_replied(id, now).await
    }

    /// Archives a message without a reply.
    pub async fn archive(&self, id: InboxMessageId) -> AppResult<()> {
        self.repository.archive(id).await
    }

    /// Fetches a message by id.
    pub async fn find_by_id(&self, id: InboxMessageId) -> AppResult<Option<InboxMessage>> {
        self.repository.find_by_id(id).await
    }

    /// How many messages a user has sent since `since`, for rate limiting.
    pub async fn contact_count_since(&self, user_id: UserId, since: DateTime<Utc>) -> AppResult<u32> {
        self.repository.contact_count_since(user_id, since).await
    }
}
