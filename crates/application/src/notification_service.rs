use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::AppResult;
use shelfguard_domain::{Notification, NotificationId, UserId};

/// Persistence port for [`Notification`]s and their per-user dismissals.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Creates a notification targeted at `user_id`, or broadcast to every
    /// user if `user_id` is `None`.
    async fn create(
        &self,
        user_id: Option<UserId>,
        message: &str,
        notification_type: &str,
        priority: i32,
        dismissable: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Notification>;

    /// Lists every notification visible to `user_id` (targeted at them, or
    /// broadcast) that they have not yet dismissed, highest priority first.
    async fn list_active_for_user(&self, user_id: UserId) -> AppResult<Vec<Notification>>;

    /// Records that `user_id` dismissed `notification_id`. Idempotent.
    async fn dismiss(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// In-app notifications: targeted or broadcast, optionally dismissable.
#[derive(Clone)]
pub struct NotificationService {
    repository: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    /// Creates a new service over the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn NotificationRepository>) -> Self {
        Self { repository }
    }

    /// Creates a notification for one user.
    pub async fn notify_user(
        &self,
        user_id: UserId,
        message: &str,
        notification_type: &str,
        priority: i32,
        dismissable: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        self.repository
            .create(Some(user_id), message, notification_type, priority, dismissable, now)
            .await
    }

    /// Creates a notification visible to every user.
    pub async fn broadcast(
        &self,
        message: &str,
        notification_type: &str,
        priority: i32,
        dismissable: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        self.repository
            .create(None, message, notification_type, priority, dismissable, now)
            .await
    }

    /// Lists the notifications a user has not yet dismissed.
    pub async fn active_for_user(&self, user_id: UserId) -> AppResult<Vec<Notification>> {
        self.repository.list_active_for_user(user_id).await
    }

    /// Dismisses a notification on behalf of a user.
    pub async fn dismiss(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.repository.dismiss(notification_id, user_id, now).await
    }
}
