use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfguard_core::{AppError, AppResult, Clock};
use shelfguard_domain::{PENDING_REGISTRATION_TTL_MINUTES, PendingRegistration, Username};

use crate::token_crypto::generate_token;

/// Persistence port for [`PendingRegistration`] rows.
#[async_trait]
pub trait PendingRegistrationRepository: Send + Sync {
    /// Creates a pending registration for `username`, first deleting any
    /// prior pending registration for that same username (invariant P1:
    /// at most one per username).
    async fn create(
        &self,
        username: &str,
        token_hash: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<PendingRegistration>;

    /// Atomically resolves and deletes the pending registration matching
    /// `token_hash`, iff it has not expired as of `now`. A consumed or
    /// expired token is unreachable by any subsequent call — deletion and
    /// lookup happen in one statement.
    async fn consume_valid(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingRegistration>>;
}

/// Short-lived, single-use tokens proving control of a chosen username
/// before a full account is created.
#[derive(Clone)]
pub struct PendingRegistrationService {
    repository: Arc<dyn PendingRegistrationRepository>,
    clock: Arc<dyn Clock>,
}

impl PendingRegistrationService {
    /// Creates a new service.
    #[must_use]
    pub fn new(repository: Arc<dyn PendingRegistrationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Begins registration for `username`, returning the raw verification
    /// token. Callers decide how to deliver it (inline in dev, out-of-band
    /// in production).
    pub async fn start(&self, username: &Username) -> AppResult<(PendingRegistration, String)> {
        let (raw_token, token_hash) = generate_token()?;
        let now = self.clock.now();
        let expires_at = now + chrono::Duration::minutes(PENDING_REGISTRATION_TTL_MINUTES);

        let pending = self
            .repository
            .create(username.as_str(), token_hash, now, expires_at)
            .await?;

        Ok((pending, raw_token))
    }

    /// Redeems a raw verification token, returning the username it was
    /// bound to. Fails with [`AppError::Authentication`] if the token is
    /// absent, expired, or already used.
    pub async fn verify(&self, raw_token: &str) -> AppResult<PendingRegistration> {
        let token_hash = crate::token_crypto::hash_token(raw_token);
        let now = self.clock.now();

        self.repository
            .consume_valid(&token_hash, now)
            .await?
            .ok_or(AppError::Authentication)
    }
}
