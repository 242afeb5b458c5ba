use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A session whose `last_seen` is older than this grace period is treated
/// as absent and reaped on next read, independent of any absolute expiry.
pub const STALE_SESSION_GRACE_MINUTES: i64 = 30;

/// Surrogate identifier for a [`Session`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionId(pub i64);

/// A live login session.
///
/// *Invariant S1:* at most one session per user — creating a new one
/// invalidates all others for the same `user_id`. *Invariant S2:* a session
/// whose `last_seen` is older than [`STALE_SESSION_GRACE_MINUTES`] is
/// treated as absent and reaped on next read.
///
/// Only the SHA-256 hash of the raw token is ever stored; the raw token
/// exists only in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Surrogate primary key.
    pub id: SessionId,
    /// The user this session authenticates.
    pub user_id: UserId,
    /// Client user agent string recorded at creation.
    pub user_agent: Option<String>,
    /// Client IP address recorded at creation.
    pub ip_address: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last observed active.
    pub last_seen: DateTime<Utc>,
}

impl Session {
    /// Whether this session is stale as of `now` and should be treated as
    /// absent.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_seen)
            > chrono::Duration::minutes(STALE_SESSION_GRACE_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at(last_seen: DateTime<Utc>) -> Session {
        Session {
            id: SessionId(1),
            user_id: UserId(1),
            user_agent: None,
            ip_address: None,
            created_at: last_seen,
            last_seen,
        }
    }

    #[test]
    fn session_within_grace_is_not_stale() {
        let now = Utc::now();
        let session = session_at(now - chrono::Duration::minutes(10));
        assert!(!session.is_stale(now));
    }

    #[test]
    fn session_past_grace_is_stale() {
        let now = Utc::now();
        let session = session_at(now - chrono::Duration::minutes(31));
        assert!(session.is_stale(now));
    }
}
