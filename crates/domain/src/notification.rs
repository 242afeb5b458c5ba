use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Surrogate identifier for a [`Notification`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationId(pub i64);

/// A user-targeted or broadcast notification.
///
/// `user_id == None` means broadcast to every user. A notification is
/// active for a given user if it has not been dismissed by them (see
/// [`NotificationDismissal`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Surrogate primary key.
    pub id: NotificationId,
    /// Target user, or `None` for a broadcast notification.
    pub user_id: Option<UserId>,
    /// Body text.
    pub message: String,
    /// Caller-defined category, e.g. `"clone_suspected"`.
    pub notification_type: String,
    /// Higher values sort first.
    pub priority: i32,
    /// Whether the recipient may dismiss it.
    pub dismissable: bool,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}

/// Per-user record that a [`Notification`] has been dismissed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDismissal {
    /// The dismissed notification.
    pub notification_id: NotificationId,
    /// The user who dismissed it.
    pub user_id: UserId,
    /// When it was dismissed.
    pub dismissed_at: DateTime<Utc>,
}
