use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::AppResult;
use shelfguard_domain::{AuthType, User, UserId, Username};

/// Persistence port for [`User`] rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Looks up a user by username.
    async fn find_by_username(&self, username: &Username) -> AppResult<Option<User>>;

    /// Looks up a user by id.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>>;

    /// Whether a username is already taken. Used only inside registration
    /// transactions — never exposed to the HTTP surface, to avoid
    /// enumeration.
    async fn username_exists(&self, username: &Username) -> AppResult<bool>;

    /// Inserts a brand-new user row in one transaction, checking and
    /// reserving the username atomically. Returns `None` if `username` was
    /// already taken, rather than erroring, since that is an expected
    /// outcome the registration flow must handle without a log entry.
    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        username: &Username,
        auth_type: AuthType,
        auth_credential: Vec<u8>,
        recovery_email: Option<String>,
        recovery_phone: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>>;

    /// Upserts a user record.
    async fn save(&self, user: &User) -> AppResult<()>;

    /// Sets `last_login` to `now`.
    async fn update_last_login(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<()>;
}

/// Read/write access to user records, with constant-time-ish lookup to
/// blunt username-enumeration timing oracles.
#[derive(Clone)]
pub struct UserDirectory {
    repository: Arc<dyn UserRepository>,
}

impl UserDirectory {
    /// Creates a new directory over the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Looks up a user by username. The repository performs the same
    /// indexed query whether or not the username exists, so a hit and a
    /// miss cost the same wall-clock time at the store layer; callers that
    /// need full enumeration resistance (e.g. login) must still perform
    /// equivalent-cost work in the miss branch themselves.
    pub async fn get_by_username(&self, username: &Username) -> AppResult<Option<User>> {
        self.repository.find_by_username(username).await
    }

    /// Looks up a user by id.
    pub async fn get_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
        self.repository.find_by_id(user_id).await
    }

    /// Whether a username is taken. Registration-only; never call this
    /// from a publicly reachable handler.
    pub async fn username_exists(&self, username: &Username) -> AppResult<bool> {
        self.repository.username_exists(username).await
    }

    /// Inserts a brand-new user, or returns `None` if the username was
    /// taken in the same instant by a concurrent registration.
    pub async fn create(
        &self,
        username: &Username,
        auth_type: AuthType,
        auth_credential: Vec<u8>,
        recovery_email: Option<String>,
        recovery_phone: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        self.repository
            .create(username, auth_type, auth_credential, recovery_email, recovery_phone, now)
            .await
    }

    /// Upserts a user record.
    pub async fn save(&self, user: &User) -> AppResult<()> {
        self.repository.save(user).await
    }

    /// Records a successful login.
    pub async fn update_last_login(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<()> {
        self.repository.update_last_login(user_id, now).await
    }
}
