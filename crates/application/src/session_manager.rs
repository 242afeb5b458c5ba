use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::{AppResult, Clock};
use shelfguard_domain::{STALE_SESSION_GRACE_MINUTES, Session, SessionId, UserId};

use crate::token_crypto::{generate_token, hash_token};

/// Minimum interval between `last_seen` writes for the same session, to
/// avoid a write storm from chatty polling clients.
pub const TOUCH_MIN_INTERVAL_SECONDS: i64 = 60;

/// Persistence port for [`Session`] rows.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Creates a session for `user_id` and, within the same transaction,
    /// invalidates every other session belonging to that user (invariant
    /// S1: at most one session per user).
    async fn create_for_user(
        &self,
        user_id: UserId,
        token_hash: String,
        user_agent: Option<String>,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Session>;

    /// Looks up a session by the hash of its raw token.
    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>>;

    /// Updates `last_seen` for a session.
    async fn touch(&self, session_id: SessionId, now: DateTime<Utc>) -> AppResult<()>;

    /// Deletes a single session.
    async fn invalidate(&self, session_id: SessionId) -> AppResult<()>;

    /// Deletes every session belonging to a user.
    async fn invalidate_user_sessions(&self, user_id: UserId) -> AppResult<()>;

    /// Deletes every session whose `last_seen` is older than `older_than`,
    /// returning the number reaped. Safe to call from a background task.
    async fn reap_stale(&self, older_than: DateTime<Utc>) -> AppResult<u64>;
}

/// Opaque-session-token issuance, staleness reaping, and the
/// single-session-per-user invariant.
#[derive(Clone)]
pub struct SessionManager {
    repository: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Creates a new session manager.
    #[must_use]
    pub fn new(repository: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Issues a new session for `user_id`, invalidating any prior session
    /// for that user. Returns the stored session and the raw token to place
    /// in the cookie — the raw value is never persisted.
    pub async fn create_for_user(
        &self,
        user_id: UserId,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> AppResult<(Session, String)> {
        let (raw_token, token_hash) = generate_token()?;
        let now = self.clock.now();
        let session = self
            .repository
            .create_for_user(user_id, token_hash, user_agent, ip_address, now)
            .await?;
        Ok((session, raw_token))
    }

    /// Resolves a raw cookie token to a live session.
    ///
    /// A session past the staleness grace is treated as absent: it is
    /// reaped and `None` is returned, rather than handed back to the
    /// caller as valid.
    pub async fn get_by_token(&self, raw_token: &str) -> AppResult<Option<Session>> {
        let token_hash = hash_token(raw_token);
        let Some(session) = self.repository.find_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if session.is_stale(now) {
            self.repository.invalidate(session.id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Updates `last_seen`, rate-limited to at most one write per
    /// [`TOUCH_MIN_INTERVAL_SECONDS`] per session.
    pub async fn touch(&self, session: &Session) -> AppResult<()> {
        let now = self.clock.now();
        let elapsed = now.signed_duration_since(session.last_seen);
        if elapsed < chrono::Duration::seconds(TOUCH_MIN_INTERVAL_SECONDS) {
            return Ok(());
        }
        self.repository.touch(session.id, now).await
    }

    /// Invalidates a single session.
    pub async fn invalidate(&self, session_id: SessionId) -> AppResult<()> {
        self.repository.invalidate(session_id).await
    }

    /// Invalidates every session belonging to a user.
    pub async fn invalidate_user_sessions(&self, user_id: UserId) -> AppResult<()> {
        self.repository.invalidate_user_sessions(user_id).await
    }

    /// Deletes every session past the staleness grace. Safe to call
    /// periodically from a background task.
    pub async fn reap_stale(&self) -> AppResult<u64> {
        let cutoff = self.clock.now() - chrono::Duration::minutes(STALE_SESSION_GRACE_MINUTES);
        self.repository.reap_stale(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use shelfguard_core::SystemClock;

    use super::*;

    #[derive(Default)]
    struct InMemorySessionRepository {
        sessions: Mutex<Vec<Session>>,
        next_id: Mutex<i64>,
    }

    #[async_trait]
    impl SessionRepository for InMemorySessionRepository {
        async fn create_for_user(
            &self,
            user_id: UserId,
            token_hash: String,
            user_agent: Option<String>,
            ip_address: Option<String>,
            now: DateTime<Utc>,
        ) -> AppResult<Session> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|poison| poison.into_inner());
            sessions.retain(|session| session.user_id != user_id);
            let mut next_id = self.next_id.lock().unwrap_or_else(|poison| poison.into_inner());
            *next_id += 1;
            let session = Session {
                id: SessionId(*next_id),
                user_id,
                user_agent,
                ip_address,
                created_at: now,
                last_seen: now,
            };
            let _ = token_hash;
            sessions.push(session.clone());
            Ok(session)
        }

        async fn find_by_token_hash(&self, _token_hash: &str) -> AppResult<Option<Session>> {
            let sessions = self.sessions.lock().unwrap_or_else(|poison| poison.into_inner());
            Ok(sessions.first().cloned())
        }

        async fn touch(&self, session_id: SessionId, now: DateTime<Utc>) -> AppResult<()> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(session) = sessions.iter_mut().find(|session| session.id == session_id) {
                session.last_seen = now;
            }
            Ok(())
        }

        async fn invalidate(&self, session_id: SessionId) -> AppResult<()> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|poison| poison.into_inner());
            sessions.retain(|session| session.id != session_id);
            Ok(())
        }

        async fn invalidate_user_sessions(&self, user_id: UserId) -> AppResult<()> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|poison| poison.into_inner());
            sessions.retain(|session| session.user_id != user_id);
            Ok(())
        }

        async fn reap_stale(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
            let mut sessions = self.sessions.lock().unwrap_or_else(|poison| poison.into_inner());
            let before = sessions.len();
            sessions.retain(|session| session.last_seen >= older_than);
            Ok((before - sessions.len()) as u64)
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(InMemorySessionRepository::default()),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn new_session_for_same_user_supersedes_prior_one() {
        let manager = manager();
        let (_, _first_token) = manager
            .create_for_user(UserId(1), None, None)
            .await
            .unwrap_or_else(|_| unreachable!());
        let (second, second_token) = manager
            .create_for_user(UserId(1), None, None)
            .await
            .unwrap_or_else(|_| unreachable!());

        let resolved = manager
            .get_by_token(&second_token)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(resolved.map(|session| session.id), Some(second.id));
    }
}
