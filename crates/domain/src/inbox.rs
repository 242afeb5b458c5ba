use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Surrogate identifier for an [`InboxMessage`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxMessageId(pub i64);

/// How an inbox message's sender expects a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplyMethod {
    /// Reply is visible in-app; no address is needed.
    InApp,
    /// Reply is sent by email to `reply_email`.
    Email,
}

/// Lifecycle state of an [`InboxMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InboxStatus {
    /// Not yet opened by an admin.
    Unread,
    /// Opened but not yet replied to.
    Read,
    /// Replied to; `reply_email` has been cleared.
    Replied,
    /// Closed without further action.
    Archived,
}

/// A user-to-admin message.
///
/// *Invariant I1:* on transition to [`InboxStatus::Replied`], `reply_email`
/// is set to `None` atomically with the status change — this is the PII
/// clearing guarantee: an email address used to request a reply does not
/// outlive the reply itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    /// Surrogate primary key.
    pub id: InboxMessageId,
    /// The user who sent the message.
    pub from_user_id: UserId,
    /// Body text.
    pub message: String,
    /// How the sender expects a reply.
    pub reply_via: ReplyMethod,
    /// Reply address; required at creation iff `reply_via == Email`, and
    /// always `None` once `status == Replied`.
    pub reply_email: Option<String>,
    /// Current lifecycle state.
    pub status: InboxStatus,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
    /// When an admin first read it, if ever.
    pub read_at: Option<DateTime<Utc>>,
    /// When it was replied to, if ever.
    pub replied_at: Option<DateTime<Utc>>,
}

/// Append-only record that a user created an inbox message, used for abuse
/// review independent of the message's own lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactLog {
    /// The user who created the message.
    pub user_id: UserId,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}
